//! Rendering-surface synchronization.
//!
//! The merged HTML is displayed inside an isolated surface (a sandboxed
//! iframe or webview) that the embedding chrome owns and may recreate at
//! any time, e.g. when the reviewer flips between desktop and mobile
//! frames. The synchronizer decides when a full-document rewrite is due:
//! whenever the merged HTML changes, and whenever the surface itself is a
//! new instance — a case plain content comparison would miss, because the
//! fresh surface is empty while the last written HTML is unchanged.

/// Identity of a concrete surface instance. A recreated surface must
/// report a new id.
pub type SurfaceId = u64;

/// A host-owned isolated rendering context. `write_document` replaces the
/// whole document (open/write/close semantics), never patches it.
pub trait RenderSurface {
    fn surface_id(&self) -> SurfaceId;

    fn write_document(&mut self, html: &str);

    /// (Re)installs the single listener forwarding popup-interaction
    /// signals to the host. Called after every write in interactive mode;
    /// a full-document write discards the previous document's listeners,
    /// so one installation per write is exactly one live listener.
    fn install_interaction_listener(&mut self) {}
}

/// Sandbox grants for the surface. The surface gets no ambient access to
/// the host page beyond what these flags allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxPolicy {
    pub scripts: bool,
    pub same_origin: bool,
    pub forms: bool,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        SandboxPolicy {
            scripts: true,
            same_origin: true,
            forms: true,
        }
    }
}

impl SandboxPolicy {
    /// The value for the surface's `sandbox` attribute.
    pub fn attribute_value(&self) -> String {
        let mut grants = Vec::new();
        if self.scripts {
            grants.push("allow-scripts");
        }
        if self.same_origin {
            grants.push("allow-same-origin");
        }
        if self.forms {
            grants.push("allow-forms");
        }
        grants.join(" ")
    }
}

/// A logical sequence number for one merge/render cycle. Cycles commit in
/// begin order; a cycle that finishes after a newer one began is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The surface received a full-document rewrite.
    Written,
    /// Surface and HTML both unchanged; no write issued.
    SkippedUnchanged,
    /// A newer cycle began after this one; its output was discarded.
    SkippedStale,
}

/// Tracks what was last written where, and which merge cycle is current.
///
/// Last-write-wins is by logical sequence, not completion time: a slow
/// earlier computation that commits after a newer `begin` is dropped, so
/// switching shopper or template mid-cycle can never leave stale content
/// on screen. No cancellation token is needed.
#[derive(Debug)]
pub struct SurfaceSynchronizer {
    policy: SandboxPolicy,
    interactive: bool,
    latest_generation: u64,
    last_written: Option<(SurfaceId, String)>,
}

impl SurfaceSynchronizer {
    pub fn new(policy: SandboxPolicy, interactive: bool) -> Self {
        SurfaceSynchronizer {
            policy,
            interactive,
            latest_generation: 0,
            last_written: None,
        }
    }

    pub fn sandbox_policy(&self) -> SandboxPolicy {
        self.policy
    }

    /// Starts a merge/render cycle. Call when the inputs (template,
    /// mapping, coupons) change; any cycle begun earlier becomes stale.
    pub fn begin(&mut self) -> Generation {
        self.latest_generation += 1;
        Generation(self.latest_generation)
    }

    /// Commits a cycle's merged HTML to the surface.
    pub fn commit(
        &mut self,
        generation: Generation,
        surface: &mut dyn RenderSurface,
        html: &str,
    ) -> SyncOutcome {
        if generation.0 < self.latest_generation {
            return SyncOutcome::SkippedStale;
        }

        let surface_id = surface.surface_id();
        let unchanged = self
            .last_written
            .as_ref()
            .is_some_and(|(id, last)| *id == surface_id && last == html);
        if unchanged {
            return SyncOutcome::SkippedUnchanged;
        }

        surface.write_document(html);
        if self.interactive {
            surface.install_interaction_listener();
        }
        self.last_written = Some((surface_id, html.to_string()));
        SyncOutcome::Written
    }

    /// Single-shot convenience for callers without a staged pipeline.
    pub fn sync(&mut self, surface: &mut dyn RenderSurface, html: &str) -> SyncOutcome {
        let generation = self.begin();
        self.commit(generation, surface, html)
    }
}
