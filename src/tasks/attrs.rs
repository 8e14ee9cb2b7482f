//! # Thread attribute application.
//!
//! Attribute control follows a desired/applied/dirty protocol: `execute`
//! records the descriptor's attributes as *desired* and marks the dirty
//! flags for anything that differs from the last *applied* value; the
//! syscall is then attempted. On failure (typically missing privilege for a
//! realtime policy) the dirty flag is **retained**, so the next opportunity
//! retries — attribute drift heals itself once privileges appear.
//!
//! The OS-level syscalls live in [`os`] and nowhere else, so alternate
//! platforms can substitute the shim.

use tracing::warn;

use crate::tasks::descriptor::TaskDescriptor;

/// Desired/applied attribute state of one owned thread.
#[derive(Default)]
pub(crate) struct ThreadAttrs {
    applied_name: Option<String>,
    applied_affinity: Option<Vec<usize>>,
    applied_policy: Option<i32>,
    applied_priority: Option<i32>,

    desired_name: Option<String>,
    desired_affinity: Option<Vec<usize>>,
    desired_policy: Option<i32>,
    desired_priority: Option<i32>,

    dirty_name: bool,
    dirty_affinity: bool,
    dirty_sched: bool,
}

impl ThreadAttrs {
    /// Records the descriptor's attributes as desired and marks what changed.
    pub(crate) fn update_desired<T>(&mut self, desc: &TaskDescriptor<T>) {
        self.desired_name = (!desc.name.is_empty()).then(|| desc.name.clone());
        self.desired_affinity = (!desc.affinity.is_empty()).then(|| desc.affinity.clone());
        self.desired_policy = (desc.policy != 0).then_some(desc.policy);
        self.desired_priority = (desc.priority != 0).then_some(desc.priority);

        if self.desired_name != self.applied_name {
            self.dirty_name = true;
        }
        if self.desired_affinity != self.applied_affinity {
            self.dirty_affinity = true;
        }
        // policy and priority apply as one syscall; either change dirties both
        if self.desired_policy != self.applied_policy
            || self.desired_priority != self.applied_priority
        {
            self.dirty_sched = true;
        }
    }

    /// Records an explicit affinity request (the `set_affinity` path).
    ///
    /// Returns `true` when the request differs from the applied state.
    pub(crate) fn request_affinity(&mut self, cores: &[usize]) -> bool {
        let desired = (!cores.is_empty()).then(|| cores.to_vec());
        if desired == self.applied_affinity {
            return false;
        }
        self.desired_affinity = desired;
        self.dirty_affinity = true;
        true
    }

    /// Attempts every dirty attribute on `thread`. Failed syscalls keep
    /// their dirty flag for the next opportunity.
    pub(crate) fn apply_if_dirty(&mut self, thread: libc::pthread_t) {
        if self.dirty_name {
            match &self.desired_name {
                Some(name) => match os::set_thread_name(thread, name) {
                    Ok(()) => {
                        self.applied_name = Some(name.clone());
                        self.dirty_name = false;
                    }
                    Err(e) => warn!(name = %name, error = %e, "pthread_setname_np failed"),
                },
                // nothing desired, nothing to change
                None => self.dirty_name = false,
            }
        }

        if self.dirty_affinity {
            match &self.desired_affinity {
                Some(cores) => match os::set_thread_affinity(thread, cores) {
                    Ok(()) => {
                        self.applied_affinity = Some(cores.clone());
                        self.dirty_affinity = false;
                    }
                    Err(e) => warn!(?cores, error = %e, "pthread_setaffinity_np failed"),
                },
                None => self.dirty_affinity = false,
            }
        }

        if self.dirty_sched {
            if self.desired_policy.is_some() || self.desired_priority.is_some() {
                let policy = self.desired_policy.unwrap_or(0);
                let priority = self.desired_priority.unwrap_or(0);
                match os::set_thread_sched(thread, policy, priority) {
                    Ok(()) => {
                        self.applied_policy = Some(policy);
                        self.applied_priority = Some(priority);
                        self.dirty_sched = false;
                    }
                    Err(e) => warn!(policy, priority, error = %e, "pthread_setschedparam failed"),
                }
            } else {
                self.dirty_sched = false;
            }
        }
    }

    pub(crate) fn affinity(&self) -> &[usize] {
        self.applied_affinity.as_deref().unwrap_or(&[])
    }

    pub(crate) fn policy(&self) -> i32 {
        self.applied_policy.unwrap_or(0)
    }

    pub(crate) fn priority(&self) -> i32 {
        self.applied_priority.unwrap_or(0)
    }

    pub(crate) fn affinity_dirty(&self) -> bool {
        self.dirty_affinity
    }
}

/// Platform syscall shim. Linux only; other platforms report `Unsupported`.
#[cfg(target_os = "linux")]
pub(crate) mod os {
    use std::ffi::CString;
    use std::io;

    /// Kernel limit: 15 chars + NUL.
    const TASK_NAME_MAX: usize = 15;

    pub(crate) fn set_thread_name(thread: libc::pthread_t, name: &str) -> io::Result<()> {
        let truncated: String = name.chars().take(TASK_NAME_MAX).collect();
        let cname = CString::new(truncated)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "name contains NUL"))?;
        let rc = unsafe { libc::pthread_setname_np(thread, cname.as_ptr()) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::from_raw_os_error(rc))
        }
    }

    pub(crate) fn set_thread_affinity(thread: libc::pthread_t, cores: &[usize]) -> io::Result<()> {
        let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
        unsafe { libc::CPU_ZERO(&mut set) };
        for &core in cores {
            unsafe { libc::CPU_SET(core, &mut set) };
        }
        let rc = unsafe {
            libc::pthread_setaffinity_np(thread, std::mem::size_of::<libc::cpu_set_t>(), &set)
        };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::from_raw_os_error(rc))
        }
    }

    pub(crate) fn set_thread_sched(
        thread: libc::pthread_t,
        policy: i32,
        priority: i32,
    ) -> io::Result<()> {
        let param = libc::sched_param {
            sched_priority: priority,
        };
        let rc = unsafe { libc::pthread_setschedparam(thread, policy, &param) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::from_raw_os_error(rc))
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub(crate) mod os {
    use std::io;

    pub(crate) fn set_thread_name(_: libc::pthread_t, _: &str) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "linux only"))
    }

    pub(crate) fn set_thread_affinity(_: libc::pthread_t, _: &[usize]) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "linux only"))
    }

    pub(crate) fn set_thread_sched(_: libc::pthread_t, _: i32, _: i32) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "linux only"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskBuilder;

    #[test]
    fn desired_changes_mark_dirty() {
        let mut attrs = ThreadAttrs::default();
        let desc = TaskBuilder::<()>::new("worker-a")
            .func(|| Ok(()))
            .affinity([1usize])
            .priority(5)
            .build()
            .unwrap();

        attrs.update_desired(&desc);
        assert!(attrs.dirty_name);
        assert!(attrs.dirty_affinity);
        assert!(attrs.dirty_sched);
    }

    #[test]
    fn unchanged_desired_stays_clean() {
        let mut attrs = ThreadAttrs::default();
        let desc = TaskBuilder::<()>::new("").func(|| Ok(())).build().unwrap();
        attrs.update_desired(&desc);
        assert!(!attrs.dirty_name);
        assert!(!attrs.dirty_affinity);
        assert!(!attrs.dirty_sched);
    }

    #[test]
    fn affinity_request_skips_identical_value() {
        let mut attrs = ThreadAttrs::default();
        assert!(attrs.request_affinity(&[0, 1]));
        // applied is still empty, so the same request is still a change
        assert!(attrs.request_affinity(&[0, 1]));
        assert!(attrs.affinity_dirty());
    }
}
