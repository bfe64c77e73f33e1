// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! cwd -> location resolution: the repository (or directory) a terminal is
//! working in, cached for 30 seconds per cwd.

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use fortynine_proto::messages::Location;

const LOCATION_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
pub struct LocationCache {
    entries: HashMap<String, (Location, Instant)>,
}

impl LocationCache {
    pub fn resolve(&mut self, cwd: &str) -> Location {
        if let Some((location, at)) = self.entries.get(cwd) {
            if at.elapsed() < LOCATION_TTL {
                return location.clone();
            }
        }
        let location = locate(cwd);
        self.entries.insert(cwd.to_owned(), (location.clone(), Instant::now()));
        location
    }
}

/// Walk up from `cwd` looking for a repository root; fall back to the
/// directory's own name.
fn locate(cwd: &str) -> Location {
    let path = Path::new(cwd);
    let mut current = Some(path);
    while let Some(dir) = current {
        if dir.join(".git").exists() {
            return Location {
                name: dir_name(dir).unwrap_or_else(|| cwd.to_owned()),
                path: dir.to_string_lossy().into_owned(),
            };
        }
        current = dir.parent();
    }
    Location {
        name: dir_name(path).unwrap_or_else(|| cwd.to_owned()),
        path: cwd.to_owned(),
    }
}

fn dir_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

#[cfg(test)]
#[path = "location_tests.rs"]
mod tests;
