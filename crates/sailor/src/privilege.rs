//! Child-side setup run between fork and exec: new session, CPU affinity,
//! then privilege drop. Only async-signal-safe-ish raw syscalls here — no
//! allocation-heavy Rust std beyond what's unavoidable, matching the
//! original agent's preexec_fn shape.

use std::io;

fn set_affinity(n_cpus: usize) {
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        for cpu in 0..n_cpus {
            libc::CPU_SET(cpu, &mut set);
        }
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set);
    }
}

/// Runs in the forked child, before exec. Order: new session/process group,
/// CPU affinity, then (unless already running as the target uid) drop
/// supplementary groups + gid + uid, set a conservative umask, and chdir
/// into the resolved working directory. A chdir failure aborts the child
/// with a distinguished exit code rather than running the chore in the
/// wrong directory.
pub fn demote_and_setup(
    target_uid: u32,
    target_gid: u32,
    groups: &[u32],
    n_cpus: usize,
    workdir: &std::ffi::CString,
) -> io::Result<()> {
    unsafe {
        libc::setsid();
        set_affinity(n_cpus);

        if libc::geteuid() == target_uid {
            if libc::chdir(workdir.as_ptr()) != 0 {
                std::process::exit(154);
            }
            return Ok(());
        }

        if groups.is_empty() {
            libc::setgroups(0, std::ptr::null());
        } else {
            let raw: Vec<libc::gid_t> = groups.iter().map(|g| *g as libc::gid_t).collect();
            libc::setgroups(raw.len() as libc::size_t, raw.as_ptr());
        }
        libc::setresgid(target_gid as libc::gid_t, target_gid as libc::gid_t, target_gid as libc::gid_t);
        libc::setresuid(target_uid as libc::uid_t, target_uid as libc::uid_t, target_uid as libc::uid_t);
        libc::umask(0o022);

        if libc::chdir(workdir.as_ptr()) != 0 {
            std::process::exit(154);
        }
    }
    Ok(())
}
