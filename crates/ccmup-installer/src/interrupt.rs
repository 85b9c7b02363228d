//! Removes the held install lock when the process is interrupted by a signal.

use std::path::Path;

#[derive(Debug)]
pub(crate) struct InterruptRegistration {
    #[cfg(unix)]
    lock_dir: usize,
    #[cfg(unix)]
    owner_file: usize,
}

#[cfg(unix)]
mod imp {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;
    use std::ptr;
    use std::sync::atomic::{AtomicPtr, Ordering};
    use std::sync::Once;

    use tracing::debug;

    use super::InterruptRegistration;

    static LOCK_DIR: AtomicPtr<libc::c_char> = AtomicPtr::new(ptr::null_mut());
    static LOCK_OWNER: AtomicPtr<libc::c_char> = AtomicPtr::new(ptr::null_mut());
    static INSTALL_HANDLERS: Once = Once::new();

    const SIGNALS: [libc::c_int; 3] = [libc::SIGINT, libc::SIGTERM, libc::SIGHUP];

    pub(super) fn register(lock_dir: &Path, owner_file: &Path) -> Option<InterruptRegistration> {
        let lock_dir = CString::new(lock_dir.as_os_str().as_bytes()).ok()?;
        let owner_file = CString::new(owner_file.as_os_str().as_bytes()).ok()?;
        // Leaked on purpose: a handler may still be reading a previously registered path.
        let lock_dir = lock_dir.into_raw();
        let owner_file = owner_file.into_raw();
        LOCK_OWNER.store(owner_file, Ordering::SeqCst);
        LOCK_DIR.store(lock_dir, Ordering::SeqCst);
        INSTALL_HANDLERS.call_once(install_handlers);
        Some(InterruptRegistration {
            lock_dir: lock_dir as usize,
            owner_file: owner_file as usize,
        })
    }

    pub(super) fn unregister(registration: &InterruptRegistration) {
        let _ = LOCK_DIR.compare_exchange(
            registration.lock_dir as *mut libc::c_char,
            ptr::null_mut(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        let _ = LOCK_OWNER.compare_exchange(
            registration.owner_file as *mut libc::c_char,
            ptr::null_mut(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    fn install_handlers() {
        let handler = remove_lock_and_reraise as extern "C" fn(libc::c_int) as libc::sighandler_t;
        for signal in SIGNALS {
            // SAFETY: the handler only performs async-signal-safe calls.
            let previous = unsafe { libc::signal(signal, handler) };
            if previous == libc::SIG_IGN {
                // SAFETY: restores the inherited disposition (e.g. SIGHUP under nohup).
                unsafe { libc::signal(signal, libc::SIG_IGN) };
            }
        }
        debug!("interrupt handlers installed for install lock cleanup");
    }

    extern "C" fn remove_lock_and_reraise(signal: libc::c_int) {
        let owner = LOCK_OWNER.swap(ptr::null_mut(), Ordering::SeqCst);
        let dir = LOCK_DIR.swap(ptr::null_mut(), Ordering::SeqCst);
        // SAFETY: pointers come from leaked CStrings; unlink, rmdir, signal and raise are
        // async-signal-safe.
        unsafe {
            if !owner.is_null() {
                libc::unlink(owner);
            }
            if !dir.is_null() {
                libc::rmdir(dir);
            }
            libc::signal(signal, libc::SIG_DFL);
            libc::raise(signal);
        }
    }
}

pub(crate) fn register(lock_dir: &Path, owner_file: &Path) -> Option<InterruptRegistration> {
    #[cfg(unix)]
    {
        imp::register(lock_dir, owner_file)
    }
    #[cfg(not(unix))]
    {
        let _ = (lock_dir, owner_file);
        None
    }
}

pub(crate) fn unregister(registration: &InterruptRegistration) {
    #[cfg(unix)]
    imp::unregister(registration);
    #[cfg(not(unix))]
    let _ = registration;
}
