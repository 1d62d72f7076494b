use std::fmt;

type Action = Box<dyn FnOnce() + Send>;

/// Named shutdown actions, run last-registered-first.
///
/// Runs on [`ExitActions::run`] or on drop, whichever comes first; each action
/// runs at most once.
#[derive(Default)]
pub struct ExitActions {
    actions: Vec<(&'static str, Action)>,
}

impl ExitActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &'static str, action: impl FnOnce() + Send + 'static) {
        self.actions.push((name, Box::new(action)));
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn names_in_run_order(&self) -> Vec<&'static str> {
        self.actions.iter().rev().map(|(name, _)| *name).collect()
    }

    pub fn run(&mut self) {
        while let Some((name, action)) = self.actions.pop() {
            log::debug!("exit action: {name}");
            action();
        }
    }
}

impl Drop for ExitActions {
    fn drop(&mut self) {
        self.run();
    }
}

impl fmt::Debug for ExitActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names_in_run_order()).finish()
    }
}
