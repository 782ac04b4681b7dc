//! Error handling for the GAMBIT CLI

use std::path::PathBuf;
use thiserror::Error;

/// Errors in how the CLI was invoked, reported with suggestions
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("No reference database given")]
    NoDatabase,

    #[error("Invalid arguments: {message}")]
    Usage { message: String },
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    pub fn usage<S: Into<String>>(message: S) -> Self {
        Self::Usage { message: message.into() }
    }
}

/// Provide helpful error messages and suggestions
pub fn format_error_with_suggestions(error: &CliError) -> String {
    let mut message = error.to_string();

    match error {
        CliError::FileNotFound { path } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Check that the file path is correct: {}\n\
                 • Paths in a list file are relative to --ldir",
                path.display()
            ));
        }

        CliError::NoDatabase => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Pass the database directory with --db\n\
                 • The directory must hold one .gdb.json and one .gs file",
            );
        }

        CliError::Config { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check your gambit.toml configuration file\n\
                 • Verify that all configuration values are valid",
            );
        }

        CliError::Usage { .. } => {
            message.push_str("\n\nRun with --help for usage.");
        }
    }

    message
}

/// Print error with helpful suggestions and exit
pub fn print_error_and_exit(error: &CliError) -> ! {
    eprintln!("Error: {}", format_error_with_suggestions(error));
    std::process::exit(1);
}
