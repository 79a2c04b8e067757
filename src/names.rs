// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Destination name disambiguation.
//!
//! Different owners frequently publish projects under the same name, e.g.,
//! `https://github.com/a/client` and `https://github.com/b/client`. Each
//! fetch job still needs its own directory under the output root, so every
//! project name handed out during a run is tracked here.

use std::collections::{HashMap, HashSet};

/// Hands out unique directory names for one run.
///
/// The first use of a project name yields the name itself. The Nth repeated
/// use yields `<name>-N`. Names are compared without regard to ASCII case,
/// because the output root may live on a case-insensitive file system.
#[derive(Debug, Default, Clone)]
pub struct NameAllocator {
    uses: HashMap<String, usize>,
    taken: HashSet<String>,
    reserved: HashSet<String>,
}

impl NameAllocator {
    /// Construct new name allocator with no names handed out yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate unique directory name for target project name.
    pub fn allocate(&mut self, project: impl AsRef<str>) -> String {
        let project = project.as_ref();
        let key = project.to_ascii_lowercase();
        let mut count = self.uses.get(&key).copied().unwrap_or(0);

        // INVARIANT: Skip suffixed candidates already claimed by a real project.
        let name = loop {
            let candidate = match count {
                0 => project.to_string(),
                n => format!("{project}-{n}"),
            };
            count += 1;

            if self.taken.insert(candidate.to_ascii_lowercase()) {
                break candidate;
            }
        };

        self.uses.insert(key, count);
        name
    }

    /// Reserve target name, so it is never handed out.
    ///
    /// Reserved names are not counted as handed out.
    pub fn reserve(&mut self, name: impl AsRef<str>) {
        let key = name.as_ref().to_ascii_lowercase();
        if self.taken.insert(key.clone()) {
            self.reserved.insert(key);
        }
    }

    /// Number of names handed out so far.
    pub fn len(&self) -> usize {
        self.taken.len() - self.reserved.len()
    }

    /// Check if no names have been handed out yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
