use std::path::PathBuf;

use libloading::Library;

use crate::error::{LispError, LispResult};
use crate::eval::Interp;

/// A module's initialization step: runs exactly once per load, with the
/// ability to register bindings in the interpreter's root environment.
pub type ModuleInit = Box<dyn FnOnce(&mut Interp) -> LispResult<()>>;

/// The narrow capability behind the `require` form: given a module name,
/// either produce an initializer or fail with a descriptive error. The
/// binary installs the dynamic-library loader; tests install stubs.
pub trait ModuleLoader {
    fn load(&mut self, name: &str) -> LispResult<ModuleInit>;
}

/// The fixed entry point every native module must export.
pub const MODULE_ENTRY: &[u8] = b"slisp_init";

type EntryFn = unsafe extern "C" fn(*mut Interp);

/// Loads natively-compiled extension modules from a plugin directory.
/// A module named `m` lives at `<dir>/m<dll-suffix>` (a name that already
/// carries an extension is used as-is). Loaded libraries are kept alive
/// for the life of the loader.
pub struct DynamicLoader {
    plugin_dir: PathBuf,
    libs: Vec<Library>,
}

impl DynamicLoader {
    pub fn new(plugin_dir: impl Into<PathBuf>) -> Self {
        DynamicLoader {
            plugin_dir: plugin_dir.into(),
            libs: Vec::new(),
        }
    }

    fn module_path(&self, name: &str) -> PathBuf {
        let path = self.plugin_dir.join(name);
        if path.extension().is_some() {
            path
        } else {
            self.plugin_dir
                .join(format!("{}{}", name, std::env::consts::DLL_SUFFIX))
        }
    }
}

impl ModuleLoader for DynamicLoader {
    fn load(&mut self, name: &str) -> LispResult<ModuleInit> {
        let path = self.module_path(name);
        let lib = unsafe { Library::new(&path) }
            .map_err(|e| LispError::ModuleLoad(format!("{}: {}", path.display(), e)))?;

        let entry: EntryFn = {
            let symbol = unsafe { lib.get::<EntryFn>(MODULE_ENTRY) }.map_err(|e| {
                LispError::ModuleLoad(format!("{}: no slisp_init entry point: {}", name, e))
            })?;
            *symbol
        };

        // The library must outlive the entry function pointer.
        self.libs.push(lib);

        Ok(Box::new(move |interp: &mut Interp| {
            // Safety: the module contract is that slisp_init takes the
            // interpreter and registers bindings before returning. The
            // library stays loaded for the life of the loader.
            unsafe { entry(interp as *mut Interp) };
            Ok(())
        }))
    }
}
