//! An in-memory [`Transport`] for testing the code that talks to the submit server.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use anyhow::{bail, Context, Error};

use crate::{RemoteOutput, Transport};

/// A fake submit server.
///
/// Commands are answered with the output registered with [`MockTransport::respond`] for the
/// program, or with an empty successful output. `rm -f` removes the files added with
/// [`MockTransport::add_file`], which are the only ones [`Transport::fetch`] can copy.
///
/// Clones share the same state, so a test can keep a clone to inspect what happened.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Rc<RefCell<MockState>>,
}

#[derive(Debug, Default)]
struct MockState {
    /// Program name suffix -> queue of outputs, the last one is repeated forever.
    responses: Vec<(String, Vec<RemoteOutput>)>,
    files: HashMap<String, Vec<u8>>,
    commands: Vec<Vec<String>>,
    fetched: Vec<String>,
}

impl MockTransport {
    /// Make a new fake server, with no files.
    pub fn new() -> MockTransport {
        Default::default()
    }

    /// Answer with `output` the next invocation of the programs whose path ends with `program`.
    ///
    /// Multiple calls queue multiple outputs, the last one is kept for all the following
    /// invocations.
    pub fn respond(&self, program: &str, output: RemoteOutput) {
        let mut state = self.state.borrow_mut();
        match state.responses.iter_mut().find(|(p, _)| p == program) {
            Some((_, queue)) => queue.push(output),
            None => state.responses.push((program.to_string(), vec![output])),
        }
    }

    /// Forget the queued outputs of `program` and answer with `output` from now on.
    pub fn respond_always(&self, program: &str, output: RemoteOutput) {
        let mut state = self.state.borrow_mut();
        state.responses.retain(|(p, _)| p != program);
        state.responses.push((program.to_string(), vec![output]));
    }

    /// Add a file that can be fetched.
    pub fn add_file<B: Into<Vec<u8>>>(&self, path: &str, content: B) {
        self.state
            .borrow_mut()
            .files
            .insert(path.to_string(), content.into());
    }

    /// Remove a file from the fake server.
    pub fn remove_file(&self, path: &str) {
        self.state.borrow_mut().files.remove(path);
    }

    /// Whether the file is present on the fake server.
    pub fn has_file(&self, path: &str) -> bool {
        self.state.borrow().files.contains_key(path)
    }

    /// All the commands run so far.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.state.borrow().commands.clone()
    }

    /// The commands run so far whose program ends with `program`.
    pub fn commands_of(&self, program: &str) -> Vec<Vec<String>> {
        self.state
            .borrow()
            .commands
            .iter()
            .filter(|c| c.first().map_or(false, |p| p.ends_with(program)))
            .cloned()
            .collect()
    }

    /// All the remote paths fetched so far.
    pub fn fetched(&self) -> Vec<String> {
        self.state.borrow().fetched.clone()
    }
}

impl Transport for MockTransport {
    fn run(&self, args: &[String]) -> Result<RemoteOutput, Error> {
        let mut state = self.state.borrow_mut();
        state.commands.push(args.to_vec());
        let program = match args.first() {
            Some(program) => program,
            None => bail!("Empty command"),
        };
        if program == "rm" {
            for path in args.iter().skip(1).filter(|a| !a.starts_with('-')) {
                state.files.remove(path);
            }
        }
        let queue = state
            .responses
            .iter_mut()
            .find(|(p, _)| program.ends_with(p.as_str()))
            .map(|(_, queue)| queue);
        let output = match queue {
            Some(queue) if queue.len() > 1 => queue.remove(0),
            Some(queue) => queue[0].clone(),
            None => RemoteOutput::ok(""),
        };
        Ok(output)
    }

    fn fetch(&self, remote: &str, local: &Path) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        state.fetched.push(remote.to_string());
        let content = match state.files.get(remote) {
            Some(content) => content,
            None => bail!("No such file on the mock server: {}", remote),
        };
        std::fs::write(local, content)
            .with_context(|| format!("Failed to write {}", local.display()))
    }
}
