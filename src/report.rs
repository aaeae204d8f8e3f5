use crate::aggregate::{sort_columns, sort_key};
use crate::error::{AuditError, Result};
use crate::model::{Member, Members};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

pub const BASE_COLUMNS: [&str; 2] = ["login", "name"];

/// The member-by-repository permission matrix, sorted and ready to write.
#[derive(Debug)]
pub struct Report {
    repo_columns: Vec<String>,
    rows: Vec<Member>,
}

impl Report {
    pub fn new(mut repo_columns: Vec<String>, members: Members) -> Self {
        sort_columns(&mut repo_columns);
        let mut rows = members.into_vec();
        rows.sort_by_cached_key(|m| sort_key(&m.login));
        Self { repo_columns, rows }
    }

    pub fn headers(&self) -> Vec<&str> {
        BASE_COLUMNS
            .iter()
            .copied()
            .chain(self.repo_columns.iter().map(String::as_str))
            .collect()
    }

    pub fn rows(&self) -> &[Member] {
        &self.rows
    }

    pub fn write_csv<W: Write>(&self, out: W) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::CRLF)
            .from_writer(out);

        writer.write_record(self.headers())?;
        for member in &self.rows {
            let mut record = Vec::with_capacity(BASE_COLUMNS.len() + self.repo_columns.len());
            record.push(member.login.as_str());
            record.push(member.name.as_deref().unwrap_or(""));
            for column in &self.repo_columns {
                record.push(member.permissions.get(column).map_or("", String::as_str));
            }
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Writes the report next to `path` and renames it into place once complete.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir)?;
        self.write_csv(file.as_file_mut())?;
        file.as_file().sync_all()?;
        file.persist(path)
            .map_err(|e| AuditError::Io(e.error))?;
        Ok(())
    }
}
