//! Loader-wide state threaded through the negotiators.
//!
//! The flags are an explicit value, not ambient globals: negotiators read
//! them from the `LoaderState` they are handed and clear them on that same
//! value when an attempt fails terminally, so a retry always starts from a
//! clean parameter stage.

use crate::source::{NfsSource, UrlSource};

/// Process-wide boot flags. Lifetime is one boot session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderFlags {
    /// The stage2 location was given explicitly, bypassing the
    /// `images/stage2.img` convention.
    pub stage2_override: bool,
    /// Dry-run mode: negotiate parameters but perform no real mounts or
    /// transfers.
    pub testing_mode: bool,
    /// No DNS is available; hostnames must be literal IPv4 addresses.
    pub no_dns: bool,
    /// Send one identifying MAC header per network interface on HTTP
    /// transfers.
    pub send_mac_headers: bool,
}

/// The install method bound by kickstart data, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodData {
    Nfs(NfsSource),
    Url(UrlSource),
}

/// State handed to a negotiator: the bound method plus global flags.
#[derive(Debug, Clone, Default)]
pub struct LoaderState {
    /// Pre-bound method data from kickstart, cleared on terminal failure.
    pub method: Option<MethodData>,
    pub flags: LoaderFlags,
}

impl LoaderState {
    /// Drop the bound method so the next attempt starts interactively.
    pub fn clear_method(&mut self) {
        self.method = None;
    }
}

/// Outcome of a negotiation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Negotiation {
    /// The source resolved; the canonical encoding is attached.
    Resolved(String),
    /// The user backed out of the first panel. Never an error.
    Back,
    /// Terminal failure: the method was cleared and no source is bound.
    Unset,
}
