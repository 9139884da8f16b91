use sysinfo::System;

pub struct ProcessChecker;

impl ProcessChecker {
    /// Takes a mutable ref to System so sysinfo can reuse its internal
    /// buffers between polls.
    pub fn is_running(sys: &mut System, process_name: &str) -> bool {
        sys.refresh_processes();

        sys.processes()
            .values()
            .any(|p| Self::name_matches(p.name(), process_name))
    }

    /// Executable names compare case-insensitively, with or without `.exe`.
    pub fn name_matches(candidate: &str, target: &str) -> bool {
        let strip = |s: &str| {
            let lower = s.to_lowercase();
            lower.strip_suffix(".exe").map(str::to_owned).unwrap_or(lower)
        };
        strip(candidate) == strip(target)
    }
}
