//! Launch: resolves identity and resources, builds the child command, forks
//! it under the chore owner's identity, and hands the child off to a
//! watcher thread (§4.6).

use std::ffi::CString;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::sync::Arc;

use fleet_core::Resources;

use crate::error::{SailorError, SailorResult};
use crate::model::RunningChore;
use crate::privilege;
use crate::state::AppState;
use crate::{passwd, watcher};

pub struct LaunchParams {
    pub chore_id: String,
    pub script: String,
    pub ressources: Resources,
    pub owner: u64,
    pub wd: Option<String>,
    pub out: Option<String>,
}

const THREAD_CAP_ENV_VARS: &[&str] = &[
    "OMP_NUM_THREADS",
    "OPENBLAS_NUM_THREADS",
    "MKL_NUM_THREADS",
    "NUMEXPR_NUM_THREADS",
    "VECLIB_MAXIMUM_THREADS",
];

const GPU_VISIBILITY_ENV_VARS: &[&str] = &[
    "CUDA_VISIBLE_DEVICES",
    "NVIDIA_VISIBLE_DEVICES",
    "HIP_VISIBLE_DEVICES",
    "ROCR_VISIBLE_DEVICES",
];

pub async fn launch(state: &Arc<AppState>, params: LaunchParams) -> SailorResult<()> {
    if state.running.snapshot().contains_key(&params.chore_id) {
        return Ok(());
    }

    let target_uid = params.owner as u32;
    let euid = unsafe { libc::geteuid() };
    if target_uid != euid && euid != 0 {
        return Err(SailorError::Forbidden(
            "sailor process cannot assume that uid".into(),
        ));
    }

    let pw = passwd::lookup(target_uid);
    let home = pw.as_ref().map(|p| p.home.clone()).unwrap_or_else(|| "/".to_string());
    let gid = pw.as_ref().map(|p| p.gid).unwrap_or(target_uid);
    let groups = pw.as_ref().map(|p| p.groups.clone()).unwrap_or_default();
    let username = pw.as_ref().map(|p| p.name.clone());

    let wd = resolve_workdir(params.wd.as_deref(), &home)?;
    let wd_cstring = CString::new(wd.clone())
        .map_err(|_| SailorError::Validation("working directory has an embedded NUL".into()))?;

    let host_cpus = num_cpus::get() as u32;
    let n_cpus = params.ressources.cpus.clamp(1, host_cpus.max(1));
    let gpu_indices: Vec<u32> = (0..params.ressources.gpus).collect();

    let mut cmd = build_command(&params, &wd, &home, username.as_deref(), n_cpus, &gpu_indices);

    unsafe {
        let groups = groups.clone();
        cmd.pre_exec(move || {
            privilege::demote_and_setup(target_uid, gid, &groups, n_cpus as usize, &wd_cstring)
        });
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| SailorError::Internal(format!("spawn failed: {e}")))?;
    let pid = child.id() as i32;

    state.running.with_mut(|running| {
        running.insert(
            params.chore_id.clone(),
            RunningChore {
                chore_id: params.chore_id.clone(),
                pid,
                pgid: pid,
                owner: params.owner,
                start: fleet_core::now_secs(),
                cancel_requested: false,
            },
        );
    })?;

    watcher::spawn(state.clone(), params.chore_id.clone(), child);

    Ok(())
}

fn resolve_workdir(requested: Option<&str>, home: &str) -> SailorResult<String> {
    if let Some(wd) = requested {
        let path = std::path::Path::new(wd);
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            let cwd = std::env::current_dir()
                .map_err(|e| SailorError::Internal(format!("cannot read current dir: {e}")))?;
            cwd.join(path)
        };
        if !absolute.exists() {
            return Err(SailorError::Validation(format!(
                "wd {} does not exist",
                absolute.display()
            )));
        }
        return Ok(absolute.to_string_lossy().into_owned());
    }
    if !home.is_empty() && std::path::Path::new(home).exists() {
        return Ok(home.to_string());
    }
    Ok("/".to_string())
}

fn build_command(
    params: &LaunchParams,
    wd: &str,
    home: &str,
    username: Option<&str>,
    n_cpus: u32,
    gpu_indices: &[u32],
) -> Command {
    let gpu_list = gpu_indices
        .iter()
        .map(|g| g.to_string())
        .collect::<Vec<_>>()
        .join(",");

    let mut cmd = Command::new("/bin/bash");
    cmd.current_dir(wd);

    let invocation = match &params.out {
        Some(out) => format!(
            "mkdir -p \"$(dirname \"{out}\")\"; {{ echo 'START CHORE::{id}'; \"{script}\"; ec=$?; echo 'END CHORE::{id}'; exit $ec; }} >> \"{out}\" 2>&1",
            out = out,
            id = params.chore_id,
            script = params.script,
        ),
        None => format!("exec \"{script}\"", script = params.script),
    };
    cmd.arg("-lc").arg(invocation);

    let user_name = username.map(str::to_string).unwrap_or_else(|| params.owner.to_string());
    cmd.env("HOME", home);
    cmd.env("USER", &user_name);
    cmd.env("LOGNAME", &user_name);
    cmd.env("SHELL", "/bin/bash");

    for var in THREAD_CAP_ENV_VARS {
        cmd.env(var, n_cpus.to_string());
    }
    cmd.env("TORCH_NUM_THREADS", n_cpus.to_string());
    cmd.env("TORCH_NUM_INTEROP_THREADS", n_cpus.clamp(1, 8).to_string());
    cmd.env("MKL_DYNAMIC", "FALSE");
    cmd.env("OMP_DYNAMIC", "FALSE");

    for var in GPU_VISIBILITY_ENV_VARS {
        cmd.env(var, &gpu_list);
    }

    // Either redirected into `out` by the shell wrapper itself, or discarded
    // entirely — the parent process never reads chore output (§4.6).
    cmd.stdout(Stdio::null()).stderr(Stdio::null());

    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_workdir_joins_relative_path_onto_cwd() {
        let cwd = std::env::current_dir().unwrap();
        let wd = resolve_workdir(Some("."), "/home/x").unwrap();
        let resolved = std::path::Path::new(&wd);
        assert!(resolved.is_absolute());
        assert_eq!(resolved.canonicalize().unwrap(), cwd.canonicalize().unwrap());
    }

    #[test]
    fn resolve_workdir_falls_back_to_root() {
        let wd = resolve_workdir(None, "").unwrap();
        assert_eq!(wd, "/");
    }

    fn collect_envs(cmd: &Command) -> std::collections::HashMap<String, String> {
        cmd.get_envs()
            .filter_map(|(k, v)| {
                Some((
                    k.to_string_lossy().into_owned(),
                    v?.to_string_lossy().into_owned(),
                ))
            })
            .collect()
    }

    fn sample_params() -> LaunchParams {
        LaunchParams {
            chore_id: "c-1".into(),
            script: "/bin/true".into(),
            ressources: Resources { cpus: 3, gpus: 2 },
            owner: 1000,
            wd: None,
            out: None,
        }
    }

    #[test]
    fn build_command_prefers_resolved_username_over_numeric_uid() {
        let params = sample_params();
        let cmd = build_command(&params, "/home/alice", "/home/alice", Some("alice"), 3, &[0, 1]);
        let envs = collect_envs(&cmd);
        assert_eq!(envs["USER"], "alice");
        assert_eq!(envs["LOGNAME"], "alice");
    }

    #[test]
    fn build_command_falls_back_to_numeric_uid_without_passwd_entry() {
        let params = sample_params();
        let cmd = build_command(&params, "/", "/", None, 3, &[0, 1]);
        let envs = collect_envs(&cmd);
        assert_eq!(envs["USER"], "1000");
        assert_eq!(envs["LOGNAME"], "1000");
    }

    #[test]
    fn build_command_caps_thread_and_gpu_env_vars() {
        let params = sample_params();
        let cmd = build_command(&params, "/", "/", None, 3, &[0, 1]);
        let envs = collect_envs(&cmd);
        for var in THREAD_CAP_ENV_VARS {
            assert_eq!(envs[*var], "3");
        }
        for var in GPU_VISIBILITY_ENV_VARS {
            assert_eq!(envs[*var], "0,1");
        }
    }
}
