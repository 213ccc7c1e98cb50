//! Program sync: diffing the supplied programs against the running set.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, warn};

use crate::claim::ProgramId;
use crate::program::{CodeHash, Program};
use crate::world::WorldState;

/// What one sync changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub started: Vec<ProgramId>,
    pub restarted: Vec<ProgramId>,
    pub stopped: Vec<ProgramId>,
}

impl SyncSummary {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.restarted.is_empty() && self.stopped.is_empty()
    }
}

/// The first program for each id, in supplied order. Later duplicates are dropped.
pub(crate) fn first_by_id(programs: &[Program]) -> Vec<Program> {
    let mut seen = HashSet::new();
    programs
        .iter()
        .filter(|program| {
            let first = seen.insert(&program.id);
            if !first {
                warn!(program = %program.id, "duplicate program id ignored");
            }
            first
        })
        .cloned()
        .collect()
}

#[derive(Debug)]
struct RunningProgram {
    code_hash: CodeHash,
    debug_url: Option<String>,
}

/// Running programs by id, with the code hash they were registered from.
#[derive(Debug, Default)]
pub(crate) struct ProgramSync {
    running: BTreeMap<ProgramId, RunningProgram>,
}

impl ProgramSync {
    /// Running program ids with their debug URLs.
    pub(crate) fn running(&self) -> impl Iterator<Item = (&ProgramId, Option<&str>)> {
        self.running.iter().map(|(id, p)| (id, p.debug_url.as_deref()))
    }

    pub(crate) fn is_running(&self, id: &ProgramId) -> bool {
        self.running.contains_key(id)
    }

    /// Brings the world in line with `programs`.
    ///
    /// Removed programs are purged. New programs are registered; programs whose
    /// code changed are purged and then registered again. A failed registration
    /// still counts as running, so it is retried only when the code changes.
    /// `programs` must not repeat an id, see [`first_by_id`].
    pub(crate) fn sync(&mut self, programs: &[Program], world: &mut WorldState) -> SyncSummary {
        let mut summary = SyncSummary::default();

        let wanted: HashSet<&ProgramId> = programs.iter().map(|p| &p.id).collect();
        let removed: Vec<ProgramId> = self
            .running
            .keys()
            .filter(|id| !wanted.contains(id))
            .cloned()
            .collect();
        for id in removed {
            self.running.remove(&id);
            world.purge(&id);
            debug!(program = %id, "program stopped");
            summary.stopped.push(id);
        }

        for program in programs {
            let restarting = match self.running.get_mut(&program.id) {
                Some(running) if running.code_hash == program.code_hash => {
                    running.debug_url.clone_from(&program.debug_url);
                    continue;
                }
                Some(_) => true,
                None => false,
            };

            world.purge(&program.id);
            // failure is already recorded against the program
            let _ = program.register(world);
            self.running.insert(
                program.id.clone(),
                RunningProgram {
                    code_hash: program.code_hash.clone(),
                    debug_url: program.debug_url.clone(),
                },
            );

            if restarting {
                debug!(program = %program.id, hash = %program.code_hash, "program code changed");
                summary.restarted.push(program.id.clone());
            } else {
                debug!(program = %program.id, hash = %program.code_hash, "program started");
                summary.started.push(program.id.clone());
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FactLogError;

    fn cool(id: &str, who: &'static str) -> Program {
        Program::new(id, who, move |ctx| {
            ctx.claim("@ is cool", [who]);
            Ok(())
        })
    }

    #[test]
    fn test_sync_starts_restarts_and_stops() {
        let mut sync = ProgramSync::default();
        let mut world = WorldState::new();

        let summary = sync.sync(&[cool("1", "Bart"), cool("2", "Lisa")], &mut world);
        assert_eq!(summary.started, vec![ProgramId::from("1"), ProgramId::from("2")]);
        assert_eq!(world.claims().len(), 2);

        assert!(sync.sync(&[cool("1", "Bart"), cool("2", "Lisa")], &mut world).is_empty());
        assert_eq!(world.claims().len(), 2);

        let summary = sync.sync(&[cool("1", "Milhouse")], &mut world);
        assert_eq!(summary.restarted, vec![ProgramId::from("1")]);
        assert_eq!(summary.stopped, vec![ProgramId::from("2")]);
        assert_eq!(world.claims().len(), 1);
        assert_eq!(world.claims()[0].args[0], crate::claim::val("Milhouse"));
        assert!(!sync.is_running(&ProgramId::from("2")));
    }

    #[test]
    fn test_failed_registration_stays_running() {
        let mut sync = ProgramSync::default();
        let mut world = WorldState::new();
        let broken = Program::new("3", "broken", |_| Err(FactLogError::callback("parse error")));

        let summary = sync.sync(std::slice::from_ref(&broken), &mut world);
        assert_eq!(summary.started.len(), 1);
        assert_eq!(world.errors().len(), 1);

        assert!(sync.sync(std::slice::from_ref(&broken), &mut world).is_empty());
        assert_eq!(world.errors().len(), 1);
        assert!(sync.is_running(&ProgramId::from("3")));
    }

    #[test]
    fn test_duplicate_ids_register_once() {
        let mut sync = ProgramSync::default();
        let mut world = WorldState::new();
        let programs = first_by_id(&[cool("1", "Bart"), cool("2", "Lisa"), cool("1", "Milhouse")]);
        assert_eq!(programs.len(), 2);

        let summary = sync.sync(&programs, &mut world);
        assert_eq!(summary.started.len(), 2);
        assert_eq!(world.claims().len(), 2);
        assert_eq!(world.claims()[0].args[0], crate::claim::val("Bart"));
    }

    #[test]
    fn test_debug_url_follows_the_latest_program() {
        let mut sync = ProgramSync::default();
        let mut world = WorldState::new();
        sync.sync(&[cool("1", "Bart")], &mut world);
        assert_eq!(sync.running().next(), Some((&ProgramId::from("1"), None)));

        // same code, new url: no restart
        let moved = cool("1", "Bart").with_debug_url("http://paper-1.local/debug");
        assert!(sync.sync(std::slice::from_ref(&moved), &mut world).is_empty());
        assert_eq!(
            sync.running().next(),
            Some((&ProgramId::from("1"), Some("http://paper-1.local/debug")))
        );
    }
}
