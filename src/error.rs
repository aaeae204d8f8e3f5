use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("GitHub API error: {0}")]
    GitHub(String),

    #[error("Organization not found: {0}")]
    OrgNotFound(String),

    #[error(
        "Consistency error: accumulated {accumulated} {collection} but GitHub reported a total of {total}"
    )]
    Consistency {
        collection: &'static str,
        accumulated: usize,
        total: u64,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

// octocrab's own Display appends a captured backtrace, so only the
// underlying causes are reported.
impl From<octocrab::Error> for AuditError {
    fn from(err: octocrab::Error) -> Self {
        let message = match &err {
            octocrab::Error::GitHub { source, .. } => source.message.clone(),
            other => match std::error::Error::source(other) {
                Some(cause) => describe_chain(cause),
                None => "request failed".to_string(),
            },
        };
        AuditError::GitHub(message)
    }
}

/// Joins an error and its causes into one line.
fn describe_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut next = err.source();
    while let Some(cause) = next {
        let text = cause.to_string();
        if !parts.iter().any(|p| p.contains(&text)) {
            parts.push(text);
        }
        next = cause.source();
    }
    parts.join(": ")
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        AuditError::GitHub(format!("Malformed response: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;
