// SPDX-License-Identifier: MIT OR Apache-2.0
//! Lazy walks over plug shells, following affects relations and connections.

use crate::graph::Graph;
use crate::shell::PlugShell;
use std::collections::{HashSet, VecDeque};
use std::fmt;

/// Direction of a walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    /// Toward inputs: affecting plugs first, then the upstream connection
    #[default]
    Up,
    /// Toward outputs: downstream connections and affected plugs
    Down,
}

type ShellPredicate<'p> = Box<dyn Fn(&PlugShell) -> bool + 'p>;

/// Parameters of a walk started with [`Graph::iter_shells`]
pub struct Traversal<'p> {
    direction: Direction,
    visit_once: bool,
    branch_first: bool,
    stop_at: Option<ShellPredicate<'p>>,
    prune: Option<ShellPredicate<'p>>,
}

impl<'p> Traversal<'p> {
    /// Walk in `direction`
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            visit_once: false,
            branch_first: false,
            stop_at: None,
            prune: None,
        }
    }

    /// Walk upstream
    pub fn up() -> Self {
        Self::new(Direction::Up)
    }

    /// Walk downstream
    pub fn down() -> Self {
        Self::new(Direction::Down)
    }

    /// Yield each shell at most once
    pub fn visit_once(mut self, visit_once: bool) -> Self {
        self.visit_once = visit_once;
        self
    }

    /// Follow connections to other nodes before the remaining plugs of the
    /// current node
    pub fn branch_first(mut self, branch_first: bool) -> Self {
        self.branch_first = branch_first;
        self
    }

    /// Do not yield nor continue past shells matching `predicate`
    pub fn stop_at(mut self, predicate: impl Fn(&PlugShell) -> bool + 'p) -> Self {
        self.stop_at = Some(Box::new(predicate));
        self
    }

    /// Continue past shells matching `predicate` without yielding them
    pub fn prune(mut self, predicate: impl Fn(&PlugShell) -> bool + 'p) -> Self {
        self.prune = Some(Box::new(predicate));
        self
    }

    /// Configured direction
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl Default for Traversal<'_> {
    fn default() -> Self {
        Self::up()
    }
}

impl fmt::Debug for Traversal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Traversal")
            .field("direction", &self.direction)
            .field("visit_once", &self.visit_once)
            .field("branch_first", &self.branch_first)
            .field("stop_at", &self.stop_at.is_some())
            .field("prune", &self.prune.is_some())
            .finish()
    }
}

/// Iterator over the shells of a walk, including the root
pub struct Shells<'g, 'p> {
    graph: &'g Graph,
    traversal: Traversal<'p>,
    stack: VecDeque<PlugShell>,
    visited: HashSet<PlugShell>,
}

impl Shells<'_, '_> {
    fn push(&mut self, shells: Vec<PlugShell>) {
        if self.traversal.branch_first {
            self.stack.extend(shells);
        } else {
            for shell in shells.into_iter().rev() {
                self.stack.push_front(shell);
            }
        }
    }

    fn expand(&mut self, shell: &PlugShell) {
        let graph = self.graph;
        match self.traversal.direction {
            Direction::Up => {
                self.push(graph.affected_by(shell));
                if let Some(input) = graph.input(shell) {
                    self.push(vec![input.clone()]);
                }
            }
            Direction::Down if self.traversal.branch_first => {
                self.push(graph.affected(shell));
                self.push(graph.outputs(shell).to_vec());
            }
            Direction::Down => {
                self.push(graph.outputs(shell).to_vec());
                self.push(graph.affected(shell));
            }
        }
    }
}

impl Iterator for Shells<'_, '_> {
    type Item = PlugShell;

    fn next(&mut self) -> Option<PlugShell> {
        while let Some(shell) = self.stack.pop_back() {
            if self.visited.contains(&shell) {
                continue;
            }
            if self.traversal.visit_once {
                self.visited.insert(shell.clone());
            }
            if self.traversal.stop_at.as_ref().is_some_and(|stop| stop(&shell)) {
                continue;
            }

            self.expand(&shell);

            if !self.traversal.prune.as_ref().is_some_and(|prune| prune(&shell)) {
                return Some(shell);
            }
        }
        None
    }
}

impl Graph {
    /// Walk the graph starting at `root`, which is yielded first unless
    /// stopped or pruned.
    ///
    /// Without `visit_once`, cyclic graphs yield forever.
    pub fn iter_shells<'g, 'p>(&'g self, root: PlugShell, traversal: Traversal<'p>) -> Shells<'g, 'p> {
        Shells {
            graph: self,
            traversal,
            stack: VecDeque::from([root]),
            visited: HashSet::new(),
        }
    }
}
