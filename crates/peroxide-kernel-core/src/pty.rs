//! Pseudo-terminal setup for the interpreter process.

use std::fs::File;
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};

use crate::error::Result;

/// Master and slave ends of a freshly opened pseudo-terminal.
pub struct PtyPair {
    pub master: File,
    pub slave: File,
}

impl PtyPair {
    /// Open a pty with echo and output newline translation disabled.
    ///
    /// With `ECHO` cleared the interpreter output never contains the lines
    /// we send; with `ONLCR` cleared its newlines arrive as plain `\n`.
    pub fn open() -> Result<Self> {
        let mut master: RawFd = -1;
        let mut slave: RawFd = -1;
        let rc = unsafe {
            libc::openpty(
                &mut master,
                &mut slave,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        };
        if rc != 0 {
            return Err(std::io::Error::last_os_error().into());
        }

        let pair = Self {
            master: unsafe { File::from_raw_fd(master) },
            slave: unsafe { File::from_raw_fd(slave) },
        };
        set_cloexec(pair.master.as_raw_fd())?;
        disable_echo(pair.slave.as_raw_fd())?;
        Ok(pair)
    }

    /// Attach the slave end to `command` as stdin, stdout, stderr and
    /// controlling terminal.
    pub fn attach(&self, command: &mut Command) -> Result<()> {
        let slave_fd = self.slave.as_raw_fd();
        command
            .stdin(Stdio::from(self.slave.try_clone()?))
            .stdout(Stdio::from(self.slave.try_clone()?))
            .stderr(Stdio::from(self.slave.try_clone()?));

        unsafe {
            command.pre_exec(move || {
                if libc::setsid() < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                if libc::ioctl(slave_fd, libc::TIOCSCTTY as _, 0) < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        Ok(())
    }
}

fn set_cloexec(fd: RawFd) -> Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } < 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

fn disable_echo(fd: RawFd) -> Result<()> {
    let mut termios: libc::termios = unsafe { std::mem::zeroed() };
    if unsafe { libc::tcgetattr(fd, &mut termios) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    termios.c_lflag &= !(libc::ECHO | libc::ECHONL);
    termios.c_oflag &= !libc::ONLCR;

    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_disables_echo() {
        let pair = PtyPair::open().unwrap();

        let mut termios: libc::termios = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::tcgetattr(pair.slave.as_raw_fd(), &mut termios) };
        assert_eq!(rc, 0);
        assert_eq!(termios.c_lflag & libc::ECHO, 0);
        assert_eq!(termios.c_oflag & libc::ONLCR, 0);
    }
}
