//! Thin wrapper around the passwd/group database. Absence of an entry is
//! non-fatal — callers fall back to numeric uid/gid and no supplementary
//! groups, matching the original agent's behavior for containerized users
//! that exist only in the kernel's uid space.

use std::ffi::{CStr, CString};

pub struct PasswdEntry {
    pub uid: u32,
    pub gid: u32,
    pub name: String,
    pub home: String,
    pub groups: Vec<u32>,
}

pub fn lookup(uid: u32) -> Option<PasswdEntry> {
    unsafe {
        let pw = libc::getpwuid(uid as libc::uid_t);
        if pw.is_null() {
            return None;
        }
        let pw = &*pw;
        let home = CStr::from_ptr(pw.pw_dir).to_string_lossy().into_owned();
        let name = CStr::from_ptr(pw.pw_name).to_string_lossy().into_owned();
        let gid = pw.pw_gid;

        let groups = group_list(&name, gid);
        Some(PasswdEntry {
            uid: pw.pw_uid,
            gid,
            name,
            home,
            groups,
        })
    }
}

unsafe fn group_list(user: &str, primary_gid: libc::gid_t) -> Vec<u32> {
    let Ok(cname) = CString::new(user) else {
        return vec![primary_gid as u32];
    };
    let mut ngroups: libc::c_int = 16;
    loop {
        let mut buf: Vec<libc::gid_t> = vec![0; ngroups as usize];
        let mut count = ngroups;
        let ret = libc::getgrouplist(cname.as_ptr(), primary_gid, buf.as_mut_ptr(), &mut count);
        if ret >= 0 {
            buf.truncate(count as usize);
            return buf.into_iter().map(|g| g as u32).collect();
        }
        ngroups = count.max(ngroups * 2);
        if ngroups > 4096 {
            return vec![primary_gid as u32];
        }
    }
}
