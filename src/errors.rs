use miette::Diagnostic;
use thiserror::Error;

use crate::authz::errors::AuthzError;

#[derive(Debug, Error, Diagnostic)]
pub enum CanopyError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(canopy::io))]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    #[diagnostic(code(canopy::config))]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    #[diagnostic(code(canopy::db))]
    Db(#[from] sea_orm::DbErr),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Authz(#[from] AuthzError),

    #[error("{0}")]
    #[diagnostic(code(canopy::other))]
    Other(String),
}
