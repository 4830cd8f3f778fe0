//! Interactive panel collaborator.
//!
//! The negotiators block on modal panels for parameter acquisition. At most
//! one panel is active at a time; "back" from the outermost panel is the
//! user-cancel outcome and is never treated as an error.

use crate::source::{UrlProtocol, UrlSource};
use std::io::{self, BufRead, Write};

/// Result of showing a modal panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Panel<T> {
    Submitted(T),
    Back,
}

/// Collaborator contract for the text UI.
pub trait LoaderUi {
    /// NFS server/directory entry panel. Pre-filled with any previous
    /// answers so a failed attempt can be corrected rather than retyped.
    fn nfs_setup(&mut self, product: &str, host: &str, directory: &str) -> Panel<(String, String)>;

    /// Primary URL panel. The second element reports whether the user asked
    /// for the secondary credential panel.
    fn url_main(&mut self, product: &str) -> Panel<(UrlSource, bool)>;

    /// Secondary credential panel, filling login/password in place.
    fn url_secondary(&mut self, url: &mut UrlSource) -> Panel<()>;

    /// Modal message with a single dismiss button.
    fn message(&mut self, title: &str, body: &str);

    /// Transient status line (e.g. "Retrieving ...").
    fn status(&mut self, body: &str);
}

/// Plain stdin/stdout panels for console operation.
///
/// An empty answer at the first prompt of a panel means "back".
pub struct ConsoleUi;

impl ConsoleUi {
    fn prompt(&self, label: &str, preset: &str) -> Option<String> {
        if preset.is_empty() {
            print!("{label}: ");
        } else {
            print!("{label} [{preset}]: ");
        }
        let _ = io::stdout().flush();

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_err() {
            return None;
        }
        let answer = line.trim();
        if answer.is_empty() {
            if preset.is_empty() {
                None
            } else {
                Some(preset.to_string())
            }
        } else {
            Some(answer.to_string())
        }
    }
}

impl LoaderUi for ConsoleUi {
    fn nfs_setup(&mut self, product: &str, host: &str, directory: &str) -> Panel<(String, String)> {
        println!("NFS Setup");
        println!("Please enter the server name and path to your {product} images.");

        let Some(host) = self.prompt("NFS server name", host) else {
            return Panel::Back;
        };
        let Some(directory) = self.prompt(&format!("{product} directory"), directory) else {
            return Panel::Back;
        };
        Panel::Submitted((host, directory))
    }

    fn url_main(&mut self, product: &str) -> Panel<(UrlSource, bool)> {
        println!("URL Setup");
        println!("Please enter the server and path to your {product} images.");

        let Some(scheme) = self.prompt("Protocol (http/ftp)", "http") else {
            return Panel::Back;
        };
        let protocol = if scheme.eq_ignore_ascii_case("ftp") {
            UrlProtocol::Ftp
        } else {
            UrlProtocol::Http
        };
        let Some(address) = self.prompt("Web site or FTP site name", "") else {
            return Panel::Back;
        };
        let Some(prefix) = self.prompt(&format!("{product} directory"), "") else {
            return Panel::Back;
        };

        let needs_secondary = protocol == UrlProtocol::Ftp
            && matches!(self.prompt("Use non-anonymous FTP (y/n)", "n"),
                        Some(answer) if answer.eq_ignore_ascii_case("y"));

        let url = UrlSource::new(protocol, address, prefix.trim_start_matches('/').to_string());
        Panel::Submitted((url, needs_secondary))
    }

    fn url_secondary(&mut self, url: &mut UrlSource) -> Panel<()> {
        println!("Further Setup");

        let Some(login) = self.prompt("Account name", url.login.as_deref().unwrap_or("")) else {
            return Panel::Back;
        };
        let Some(password) = self.prompt("Password", url.password.as_deref().unwrap_or("")) else {
            return Panel::Back;
        };
        url.login = Some(login);
        url.password = Some(password);
        Panel::Submitted(())
    }

    fn message(&mut self, title: &str, body: &str) {
        println!("[{title}] {body}");
    }

    fn status(&mut self, body: &str) {
        println!("{body}");
    }
}
