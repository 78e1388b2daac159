//! Process resource counters read through `getrusage(RUSAGE_SELF)`.

use std::mem::MaybeUninit;
use std::time::Duration;

/// CPU time consumed by the process, split by mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct CpuTime {
    /// Time spent executing in user mode.
    pub user: Duration,
    /// Time spent executing in the kernel on behalf of the process.
    pub system: Duration,
}

impl CpuTime {
    /// User plus system time.
    pub fn total(&self) -> Duration {
        self.user + self.system
    }
}

fn rusage_self() -> libc::rusage {
    let mut usage = MaybeUninit::<libc::rusage>::zeroed();
    // SAFETY: the pointer is valid for writes of one `rusage`, and an
    // all-zero `rusage` is a valid value should the call leave it untouched.
    unsafe {
        libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr());
        usage.assume_init()
    }
}

fn timeval_to_duration(tv: libc::timeval) -> Duration {
    let secs = tv.tv_sec.max(0) as u64;
    let micros = tv.tv_usec.clamp(0, 999_999) as u32;
    Duration::new(secs, micros * 1_000)
}

/// Current process CPU time.
#[inline]
pub fn cpu_time() -> CpuTime {
    let usage = rusage_self();
    CpuTime {
        user: timeval_to_duration(usage.ru_utime),
        system: timeval_to_duration(usage.ru_stime),
    }
}

/// Peak resident set size of the process, in kilobytes.
pub fn peak_rss_kb() -> u64 {
    let maxrss = rusage_self().ru_maxrss.max(0) as u64;
    // Darwin reports bytes, everyone else kilobytes.
    if cfg!(target_os = "macos") {
        maxrss / 1024
    } else {
        maxrss
    }
}
