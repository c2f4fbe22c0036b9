use std::error::Error;
use std::io::Write;

use super::command::{Command, WhereArg};
use super::util::document_json;
use crate::connection::Connection;
use crate::document::Document;
use crate::errors::DbError;
use crate::query::{PageRequest, QueryBuilder};
use crate::store::DocumentStore;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputMode {
    Human,
    Plain,
    Json,
}

fn apply_wheres<S: DocumentStore + ?Sized>(
    mut q: QueryBuilder<S>,
    wheres: Vec<WhereArg>,
) -> Result<QueryBuilder<S>, DbError> {
    for w in wheres {
        q = q.where_op(w.field, &w.op, w.value)?;
    }
    Ok(q)
}

fn print_documents(
    out: &mut dyn Write,
    docs: &[Document],
    mode: OutputMode,
) -> Result<(), Box<dyn Error>> {
    for d in docs {
        match mode {
            OutputMode::Json => writeln!(out, "{}", document_json(d))?,
            OutputMode::Plain => writeln!(out, "{}", d.id)?,
            OutputMode::Human => writeln!(out, "{}\t{}", d.id, document_json(d))?,
        }
    }
    Ok(())
}

/// Runs `cmd` printing to stdout. Returns the process exit code.
///
/// # Errors
/// Query and store failures of every command except `health-check`, which
/// reports them as a status line and exit code 1.
pub fn run_with_format<S: DocumentStore + ?Sized>(
    conn: &Connection<S>,
    cmd: Command,
    mode: OutputMode,
) -> Result<i32, Box<dyn Error>> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    run_to(conn, cmd, mode, &mut lock)
}

pub fn run<S: DocumentStore + ?Sized>(conn: &Connection<S>, cmd: Command) -> Result<i32, Box<dyn Error>> {
    run_with_format(conn, cmd, OutputMode::Human)
}

/// Like [`run_with_format`] with an explicit output sink.
///
/// # Errors
/// See [`run_with_format`].
pub fn run_to<S: DocumentStore + ?Sized>(
    conn: &Connection<S>,
    cmd: Command,
    mode: OutputMode,
    out: &mut dyn Write,
) -> Result<i32, Box<dyn Error>> {
    match cmd {
        Command::HealthCheck { collection } => health_check(conn, collection, mode, out),
        Command::Get { collection, wheres, order_by, limit, select } => {
            let mut q = apply_wheres(conn.table(&collection), wheres)?;
            for (field, order) in order_by {
                q = q.order_by(field, order);
            }
            if let Some(n) = limit {
                q = q.limit(n);
            }
            if !select.is_empty() {
                q = q.select(select);
            }
            let docs = q.get()?;
            print_documents(out, &docs, mode)?;
            Ok(0)
        }
        Command::Count { collection, wheres } => {
            let n = apply_wheres(conn.table(&collection), wheres)?.count()?;
            match mode {
                OutputMode::Json => writeln!(out, "{}", serde_json::json!({ "count": n }))?,
                _ => writeln!(out, "{n}")?,
            }
            Ok(0)
        }
        Command::Find { collection, id } => match conn.table(&collection).find(id) {
            Ok(doc) => {
                print_documents(out, std::slice::from_ref(&doc), mode)?;
                Ok(0)
            }
            Err(e) if e.is_not_found() => {
                match mode {
                    OutputMode::Json => writeln!(out, "null")?,
                    _ => writeln!(out, "{e}")?,
                }
                Ok(1)
            }
            Err(e) => Err(e.into()),
        },
        Command::Paginate { collection, wheres, per_page, page, after } => {
            let mut req = PageRequest::new(per_page);
            if let Some(p) = page {
                req = req.page(p);
            }
            if let Some(id) = after {
                req = req.after(id);
            }
            let page = apply_wheres(conn.table(&collection), wheres)?.paginate(req)?;
            match mode {
                OutputMode::Json => {
                    let items: Vec<serde_json::Value> = page.items.iter().map(document_json).collect();
                    let json = serde_json::json!({
                        "items": items,
                        "total": page.total,
                        "per_page": page.per_page,
                        "current_page": page.current_page,
                        "last_page": page.last_page(),
                        "last_document_id": page.cursor.last_document_id,
                    });
                    writeln!(out, "{json}")?;
                }
                OutputMode::Plain => print_documents(out, &page.items, mode)?,
                OutputMode::Human => {
                    print_documents(out, &page.items, mode)?;
                    writeln!(
                        out,
                        "page {}/{} ({} total)",
                        page.current_page,
                        page.last_page(),
                        page.total
                    )?;
                    if let Some(id) = &page.cursor.last_document_id {
                        writeln!(out, "next: --after {id}")?;
                    }
                }
            }
            Ok(0)
        }
    }
}

fn health_check<S: DocumentStore + ?Sized>(
    conn: &Connection<S>,
    collection: Option<String>,
    mode: OutputMode,
    out: &mut dyn Write,
) -> Result<i32, Box<dyn Error>> {
    let collection = collection.unwrap_or_else(|| conn.config().health_check_collection.clone());
    if mode == OutputMode::Human {
        writeln!(out, "Starting document store health check...")?;
    }
    let result = conn.table(&collection).limit(1).get();
    let (code, status) = match &result {
        Ok(_) => (0, "Document store connection is healthy.".to_string()),
        Err(DbError::Store(msg)) => (1, format!("Failed to connect to the document store: {msg}")),
        Err(e) => (1, format!("An unexpected error occurred: {e}")),
    };
    match &result {
        Ok(_) => log::info!("health check on {collection} passed"),
        Err(e) => log::error!("health check on {collection} failed: {e}"),
    }
    match mode {
        OutputMode::Json => writeln!(
            out,
            "{}",
            serde_json::json!({ "healthy": code == 0, "collection": collection, "message": status })
        )?,
        OutputMode::Plain => writeln!(out, "{}", if code == 0 { "ok" } else { "fail" })?,
        OutputMode::Human => {
            if code == 0 {
                writeln!(out, "Successfully connected to the document store.")?;
            }
            writeln!(out, "{status}")?;
        }
    }
    Ok(code)
}
