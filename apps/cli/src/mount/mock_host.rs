//! Scripted stand-in for the external helpers and the OS mount table.
//!
//! Commands are looked up by `"<program> <first arg>"` first, then by `"<program>"` alone.
//! Scripted responses are consumed in order; the last one sticks. Unscripted commands succeed
//! with empty output. A scripted response can also flip the mounted flag, which is how tests
//! model a helper that really mounted (or unmounted) the device.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::path::Path;

use super::table::MountTable;
use crate::process::{CommandOutput, ProcessRunner};

/// Mount table change caused by a scripted command.
#[derive(Debug, Clone)]
pub enum Effect {
    None,
    /// Marks the path mounted, with this `mount` output line.
    Mount(String),
    Unmount,
}

#[derive(Debug, Clone)]
struct Scripted {
    output: CommandOutput,
    effect: Effect,
}

#[derive(Default)]
pub struct MockHost {
    mounted: Cell<bool>,
    line: RefCell<Option<String>>,
    responses: RefCell<HashMap<String, VecDeque<Scripted>>>,
    calls: RefCell<Vec<String>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, key: &str, output: CommandOutput) {
        self.respond_with(key, output, Effect::None);
    }

    pub fn respond_with(&self, key: &str, output: CommandOutput, effect: Effect) {
        self.responses
            .borrow_mut()
            .entry(key.to_string())
            .or_default()
            .push_back(Scripted { output, effect });
    }

    /// Marks the path as mounted outside of any scripted command.
    pub fn set_mounted(&self, line: &str) {
        self.mounted.set(true);
        *self.line.borrow_mut() = Some(line.to_string());
    }

    /// Simulates the OS dropping the mount behind our back.
    pub fn set_unmounted(&self) {
        self.mounted.set(false);
        *self.line.borrow_mut() = None;
    }

    /// Every command run so far, formatted as `"program arg1 arg2"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Calls whose text starts with `prefix`.
    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls().into_iter().filter(|call| call.starts_with(prefix)).collect()
    }

    fn next_response(&self, key: &str) -> Option<Scripted> {
        let mut responses = self.responses.borrow_mut();
        let queue = responses.get_mut(key)?;
        if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() }
    }

    fn apply(&self, effect: Effect) {
        match effect {
            Effect::None => {}
            Effect::Mount(line) => self.set_mounted(&line),
            Effect::Unmount => self.set_unmounted(),
        }
    }
}

impl ProcessRunner for MockHost {
    fn run(&self, program: &str, args: &[&str]) -> CommandOutput {
        let mut call = program.to_string();
        for arg in args {
            call.push(' ');
            call.push_str(arg);
        }
        self.calls.borrow_mut().push(call);

        let specific = args.first().map(|arg| format!("{program} {arg}"));
        let scripted = specific
            .and_then(|key| self.next_response(&key))
            .or_else(|| self.next_response(program));
        match scripted {
            Some(Scripted { output, effect }) => {
                // Applied whatever the exit code: helpers can mount and still exit nonzero
                self.apply(effect);
                output
            }
            None => CommandOutput::ok(""),
        }
    }
}

impl MountTable for MockHost {
    fn is_mounted(&self, _path: &Path) -> bool {
        self.mounted.get()
    }

    fn mount_line(&self, _path: &Path) -> Option<String> {
        if self.mounted.get() { self.line.borrow().clone() } else { None }
    }
}
