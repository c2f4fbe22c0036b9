// Builder, execution and pagination over a `DocumentStore`.
mod builder;
mod cursor;
mod paginate;
pub(crate) mod types;

pub use builder::{DEFAULT_KEY, QueryBuilder};
pub use cursor::Cursor;
pub use paginate::{
    CURSOR_PARAM, CursorMeta, DEFAULT_PAGE_NAME, DEFAULT_PER_PAGE, Page, PageRequest, PerPage,
};
pub use types::{MAX_IN_SET, Operator, Order, Predicate, SortSpec, WhereClause};
