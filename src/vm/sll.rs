//! Dynamic loading of native function bundles.
//!
//! A module value whose path points at an OS shared library and whose
//! export list names the symbols to resolve is materialized into an
//! [`SllFunctions`] map. Resolution is eager: a load failure or missing
//! symbol raises an IO error and drops the half-opened handle. The map
//! owns the library handle; dropping the map closes it.
//!
//! Native ABI: each exported symbol is
//! `unsafe extern "C" fn(*const ObjectRef, usize) -> *mut ObjectRef`, taking
//! the argument vector by pointer and length and returning a heap-allocated
//! `ObjectRef` the VM reclaims. A null return reports failure.

use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use libloading::Library;

use crate::error::VmError;
use crate::vm::mem::ObjectRef;

pub type RawNativeFn = unsafe extern "C" fn(*const ObjectRef, usize) -> *mut ObjectRef;

#[derive(Debug)]
pub struct SllFunctions {
    path: PathBuf,
    functions: HashMap<String, RawNativeFn>,
    // Symbols above alias into this handle, so it must outlive them.
    _lib: Library,
}

impl SllFunctions {
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn function_names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }

    pub fn call(&self, name: &str, args: &[ObjectRef]) -> Result<ObjectRef, VmError> {
        let function = self.functions.get(name).ok_or_else(|| {
            VmError::io(format!(
                "function '{}' not resolved from {}",
                name,
                self.path.display()
            ))
        })?;

        trace!("native call {} ({} args)", name, args.len());
        let raw = unsafe { function(args.as_ptr(), args.len()) };
        if raw.is_null() {
            return Err(VmError::io(format!(
                "native function '{}' returned no value",
                name
            )));
        }
        Ok(unsafe { *Box::from_raw(raw) })
    }
}

/// Loads the library at `path` and resolves every name in `exports`.
pub fn load_sll(path: &Path, exports: &[String]) -> Result<SllFunctions, VmError> {
    info!("loading shared library {}", path.display());

    let lib = unsafe { Library::new(path) }.map_err(|e| {
        VmError::io(format!("failed to load library {}: {}", path.display(), e))
    })?;

    let mut functions = HashMap::new();
    for name in exports {
        let symbol = unsafe { lib.get::<RawNativeFn>(name.as_bytes()) }.map_err(|e| {
            VmError::io(format!(
                "failed to resolve '{}' in {}: {}",
                name,
                path.display(),
                e
            ))
        })?;
        debug!("resolved symbol {} from {}", name, path.display());
        functions.insert(name.clone(), *symbol);
    }

    Ok(SllFunctions {
        path: path.to_path_buf(),
        functions,
        _lib: lib,
    })
}

/// Per-VM cache of loaded libraries. Loading is additive and idempotent per
/// path: the export list that first loaded a path wins.
pub struct NativeLibraries {
    libs: HashMap<PathBuf, SllFunctions>,
}

impl NativeLibraries {
    pub fn new() -> Self {
        NativeLibraries {
            libs: HashMap::new(),
        }
    }

    pub fn load(&mut self, path: &Path, exports: &[String]) -> Result<&SllFunctions, VmError> {
        if !self.libs.contains_key(path) {
            let functions = load_sll(path, exports)?;
            self.libs.insert(path.to_path_buf(), functions);
        }
        Ok(&self.libs[path])
    }
}

impl Default for NativeLibraries {
    fn default() -> Self {
        NativeLibraries::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn missing_library_is_io_error() {
        let err = load_sll(Path::new("/nonexistent/libzata_ext.so"), &[]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Io);
    }

    #[test]
    fn cache_reports_load_failures() {
        let mut libs = NativeLibraries::new();
        let err = libs
            .load(Path::new("/nonexistent/libzata_ext.so"), &[])
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Io);
    }
}
