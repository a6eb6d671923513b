//! Library detection through the process status API (Windows).

use super::library::LibraryDetector;
use crate::packer::{Result, error::Error, path::PackPath};
use windows::Win32::{
    Foundation::{CloseHandle, HANDLE, HMODULE},
    System::{
        ProcessStatus::{K32EnumProcessModules, K32GetModuleFileNameExW},
        Threading::{OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ},
    },
};

/// Enumerates module handles of a process and resolves each to its file.
#[derive(Debug, Default)]
pub struct ModuleEnumDetector;

impl LibraryDetector for ModuleEnumDetector {
    fn strategy(&self) -> &'static str {
        "module enumeration"
    }

    fn loaded_libraries(&self, pid: u32) -> Result<Vec<PackPath>> {
        let process = unsafe { OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, false, pid) }
            .map_err(|e| Error::GenericError(format!("failed to open process {pid}: {e}")))?;
        let result = enumerate_modules(process);
        unsafe {
            let _ = CloseHandle(process);
        }
        result
    }
}

fn enumerate_modules(process: HANDLE) -> Result<Vec<PackPath>> {
    let handle_size = std::mem::size_of::<HMODULE>();
    let mut modules = vec![HMODULE::default(); 256];
    loop {
        let mut needed = 0u32;
        let capacity = u32::try_from(modules.len() * handle_size)?;
        unsafe { K32EnumProcessModules(process, modules.as_mut_ptr(), capacity, &mut needed) }
            .ok()
            .map_err(|e| Error::GenericError(format!("failed to enumerate modules: {e}")))?;
        let count = needed as usize / handle_size;
        if count <= modules.len() {
            modules.truncate(count);
            break;
        }
        modules.resize(count, HMODULE::default());
    }

    let mut libraries = Vec::new();
    let mut name = vec![0u16; 32768];
    for module in modules {
        let len = unsafe { K32GetModuleFileNameExW(Some(process), Some(module), &mut name) } as usize;
        if len == 0 {
            continue;
        }
        let path = PackPath::new(String::from_utf16_lossy(&name[..len]));
        if path.has_ext("dll") && !libraries.contains(&path) {
            libraries.push(path);
        }
    }
    Ok(libraries)
}
