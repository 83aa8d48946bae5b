//! PID 文件工具

use std::fs;
use std::path::Path;

/// 读取 PID（不检查存活）
pub(crate) fn read_pid(pid_path: &Path) -> Option<i32> {
    fs::read_to_string(pid_path).ok()?.trim().parse().ok()
}

/// 读取 PID 文件并检查进程是否存活，存活时返回 PID
pub(crate) fn pid_alive(pid_path: &Path) -> Option<i32> {
    let pid = read_pid(pid_path)?;

    // kill(pid, 0) 只做存在性检查
    let alive = unsafe { libc::kill(pid, 0) == 0 };
    alive.then_some(pid)
}
