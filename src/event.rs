//! Event/handler layer: the crate's logging substrate.
//!
//! No `log`/`tracing` dependency is pulled in. Instead every pipeline phase reports
//! structured events through a [`Handler`] trait, generated by
//! [`crate::trait_event_handler`] the same way the teacher crate's `download::Handler`
//! is generated: every method has a no-op default, so adding an event kind in a later
//! version never breaks downstream implementors. `Handler` is implemented for `()`,
//! for `&mut H`, and for `(H0, H1)` (fan-out to both), so a caller can combine a logger
//! and a progress bar with a single tuple.

use std::path::Path;

/// One step of a materialization phase (library, native, asset...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    Libraries,
    Natives,
    Assets,
    AssetsCopy,
}

crate::trait_event_handler! {
    /// Receives every event emitted while resolving, materializing and launching a
    /// Minecraft installation.
    pub trait Handler {
        /// A human-readable diagnostic message, prefixed `[MCLC]:` by convention.
        fn debug(message: &str);

        /// Byte-level progress of one file transfer.
        fn download_status(name: &str, kind: ProgressKind, current: u64, total: u64);

        /// One file has finished downloading.
        fn download(name: &str);

        /// Step-level progress within a materialization phase.
        fn progress(kind: ProgressKind, task: u32, total: u32);

        /// The fully synthesized argument list, emitted just before spawning the game.
        fn arguments(args: &[String]);

        /// A chunk of the child process's stdout or stderr, already UTF-8 decoded.
        fn data(chunk: &str);

        /// The child process has exited.
        fn close(exit_code: Option<i32>);

        /// A client package archive has finished extracting into the root directory.
        fn package_extract();

        /// A non-fatal problem worth surfacing (e.g. a tolerated native-extraction
        /// error, or a skipped library with no download source).
        fn warning(path: Option<&Path>, message: &str);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        debugs: u32,
        closes: u32,
    }

    impl Handler for Counter {
        fn debug(&mut self, _message: &str) {
            self.debugs += 1;
        }

        fn close(&mut self, _exit_code: Option<i32>) {
            self.closes += 1;
        }
    }

    #[test]
    fn unit_handler_is_a_no_op() {
        let mut handler = ();
        handler.debug("hello");
        handler.progress(ProgressKind::Libraries, 1, 2);
    }

    #[test]
    fn tuple_handler_fans_out_to_both() {
        let mut a = Counter::default();
        let mut b = Counter::default();
        {
            let mut combined = (&mut a, &mut b);
            combined.debug("start");
            combined.close(Some(0));
        }
        assert_eq!(a.debugs, 1);
        assert_eq!(b.debugs, 1);
        assert_eq!(a.closes, 1);
        assert_eq!(b.closes, 1);
    }
}
