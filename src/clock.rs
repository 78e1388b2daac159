//! Clock source: cycle counter, process CPU time and monotonic wall clock.
//!
//! A [`ClockSample`] reads all three references back to back. The cycle
//! counter is the free-running register of the CPU:
//! - x86_64: `lfence; rdtsc`
//! - aarch64: `isb; mrs cntvct_el0`
//!
//! Other targets are rejected at build time.

use crate::resource::{self, CpuTime};
use lazy_static::lazy_static;
use std::time::{Duration, Instant};

#[cfg(not(unix))]
compile_error!("pmu reads process CPU time through getrusage and needs a unix target");

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
compile_error!("pmu needs a readable cycle counter (x86_64 or aarch64)");

lazy_static! {
    static ref PROCESS_EPOCH: Instant = Instant::now();
}

/// Raw readings of the three time references taken at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSample {
    /// Cycle counter value.
    pub cycle_count: u64,
    /// Process CPU time consumed so far.
    pub cpu: CpuTime,
    /// Monotonic wall time since the process clock epoch.
    pub wall_time: Duration,
}

/// Read the clock source.
#[inline]
pub fn sample() -> ClockSample {
    let wall_time = PROCESS_EPOCH.elapsed();
    let cpu = resource::cpu_time();
    let cycle_count = read_cycles();
    ClockSample {
        cycle_count,
        cpu,
        wall_time,
    }
}

/// Read the CPU cycle counter with serialization.
#[inline]
pub fn read_cycles() -> u64 {
    #[cfg(target_arch = "x86_64")]
    {
        read_cycles_x86_64()
    }

    #[cfg(target_arch = "aarch64")]
    {
        read_cycles_aarch64()
    }
}

#[cfg(target_arch = "x86_64")]
#[inline]
fn read_cycles_x86_64() -> u64 {
    std::sync::atomic::compiler_fence(std::sync::atomic::Ordering::SeqCst);

    let cycles: u64;
    // SAFETY: rdtsc is available on every x86_64 CPU and only writes rax/rdx.
    unsafe {
        std::arch::asm!(
            "lfence",
            "rdtsc",
            "shl rdx, 32",
            "or rax, rdx",
            out("rax") cycles,
            out("rdx") _,
            options(nostack, nomem),
        );
    }

    std::sync::atomic::compiler_fence(std::sync::atomic::Ordering::SeqCst);
    cycles
}

#[cfg(target_arch = "aarch64")]
#[inline]
fn read_cycles_aarch64() -> u64 {
    std::sync::atomic::compiler_fence(std::sync::atomic::Ordering::SeqCst);

    let cycles: u64;
    // SAFETY: cntvct_el0 is readable from EL0 on every supported OS.
    unsafe {
        std::arch::asm!(
            "isb",
            "mrs {}, cntvct_el0",
            out(reg) cycles,
            options(nostack, nomem),
        );
    }

    std::sync::atomic::compiler_fence(std::sync::atomic::Ordering::SeqCst);
    cycles
}
