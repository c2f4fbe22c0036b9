use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use super::builder::QueryBuilder;
use super::cursor::Cursor;
use super::types::SortSpec;
use crate::document::Document;
use crate::errors::DbError;
use crate::store::{CollectionRef, DocumentStore};
use crate::types::DocumentId;

pub const DEFAULT_PER_PAGE: usize = 15;
pub const DEFAULT_PAGE_NAME: &str = "page";
/// Request parameter carrying the resume token.
pub const CURSOR_PARAM: &str = "last_document_id";

/// Page size, fixed or derived from the total.
pub enum PerPage {
    Fixed(usize),
    Computed(Box<dyn Fn(usize) -> usize + Send + Sync>),
}

impl PerPage {
    pub fn computed(f: impl Fn(usize) -> usize + Send + Sync + 'static) -> Self {
        Self::Computed(Box::new(f))
    }

    #[must_use]
    pub fn resolve(&self, total: usize) -> usize {
        match self {
            Self::Fixed(n) => *n,
            Self::Computed(f) => f(total),
        }
    }
}

impl From<usize> for PerPage {
    fn from(n: usize) -> Self {
        Self::Fixed(n)
    }
}

impl fmt::Debug for PerPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => f.debug_tuple("Fixed").field(n).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Inputs of a cursor-paginated read.
///
/// `page` only labels the result. Which documents come back is decided by
/// `last_document_id` alone; a page number that disagrees with the cursor is
/// reported as given.
#[derive(Debug)]
pub struct PageRequest {
    pub per_page: PerPage,
    pub page_name: String,
    pub page: Option<usize>,
    pub total: Option<usize>,
    pub last_document_id: Option<DocumentId>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(DEFAULT_PER_PAGE)
    }
}

impl PageRequest {
    pub fn new(per_page: impl Into<PerPage>) -> Self {
        Self {
            per_page: per_page.into(),
            page_name: DEFAULT_PAGE_NAME.to_string(),
            page: None,
            total: None,
            last_document_id: None,
        }
    }

    /// Reads the page number (under `page_name`) and the resume token
    /// (under [`CURSOR_PARAM`]) from request parameters. Unparseable or
    /// empty values are ignored.
    #[must_use]
    pub fn from_params(params: &HashMap<String, String>, page_name: &str) -> Self {
        let mut req = Self::default().page_name(page_name);
        req.page = params.get(page_name).and_then(|p| p.trim().parse::<usize>().ok()).filter(|p| *p > 0);
        req.last_document_id = params
            .get(CURSOR_PARAM)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(DocumentId::from);
        req
    }

    #[must_use]
    pub fn per_page(mut self, per_page: impl Into<PerPage>) -> Self {
        self.per_page = per_page.into();
        self
    }

    #[must_use]
    pub fn page_name(mut self, name: impl Into<String>) -> Self {
        self.page_name = name.into();
        self
    }

    #[must_use]
    pub const fn page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    #[must_use]
    pub const fn total(mut self, total: usize) -> Self {
        self.total = Some(total);
        self
    }

    #[must_use]
    pub fn after(mut self, id: impl Into<DocumentId>) -> Self {
        self.last_document_id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CursorMeta {
    pub last_document_id: Option<DocumentId>,
}

/// One page of results plus the token for the next one.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub items: Vec<Document>,
    pub total: usize,
    pub per_page: usize,
    pub current_page: usize,
    pub page_name: String,
    pub cursor: CursorMeta,
}

impl Page {
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn last_page(&self) -> usize {
        self.total.div_ceil(self.per_page.max(1)).max(1)
    }

    /// Advisory: derived from `total` and the page label, not from the cursor.
    #[must_use]
    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page()
    }

    /// Request parameters for the following page.
    #[must_use]
    pub fn next_params(&self) -> HashMap<String, String> {
        let mut params = HashMap::new();
        params.insert(self.page_name.clone(), (self.current_page + 1).to_string());
        if let Some(id) = &self.cursor.last_document_id {
            params.insert(CURSOR_PARAM.to_string(), id.to_string());
        }
        params
    }
}

impl<S: DocumentStore + ?Sized> QueryBuilder<S> {
    /// Reads one page ordered by the key field, resuming strictly after
    /// `last_document_id` when that document still exists.
    ///
    /// Without a `total` override the whole query is counted first (see
    /// [`QueryBuilder::count`]). Documents lacking the key field cannot be
    /// ordered by it and are not paged.
    ///
    /// # Errors
    /// `InvalidArgument` when the resolved page size is zero; store errors
    /// propagate.
    pub fn paginate(self, request: PageRequest) -> Result<Page, DbError> {
        let current_page = request.page.filter(|p| *p > 0).unwrap_or(1);
        let total = match request.total {
            Some(t) => t,
            None => self.clone().count()?,
        };
        let per_page = request.per_page.resolve(total);
        if per_page == 0 {
            return Err(DbError::invalid("per_page must be at least 1"));
        }

        let mut query = self.to_store_query();
        if query.order_by.last().is_none_or(|s| s.field != self.key_name) {
            query.order_by.push(SortSpec::asc(self.key_name.clone()));
        }
        if let Some(last) = &request.last_document_id {
            let snap = CollectionRef::new(&*self.store, self.collection.clone())
                .document(last.clone())
                .snapshot()?;
            if snap.exists() {
                query.start_after = Some(snap);
            } else {
                log::debug!(
                    "paginate {}: cursor {last} no longer exists, reading from the start",
                    self.collection
                );
            }
        }
        query.limit = Some(per_page);

        let items = self.run("paginate", &query).map(Cursor::to_vec)?;
        let last_document_id = items.last().map(|d| d.id.clone());
        Ok(Page {
            items,
            total,
            per_page,
            current_page,
            page_name: request.page_name,
            cursor: CursorMeta { last_document_id },
        })
    }
}
