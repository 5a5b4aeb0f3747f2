use std::collections::HashMap;
use std::fs;
use std::io::{self, BufWriter, Read};
use std::path::{Path, PathBuf};

use cardscan_core::Language;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::hash::{self, DigestWriter};

pub const TESSDATA_DIR: &str = "tessdata";

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Trained data '{0}' is not in the asset bundle")]
    BundleMissing(String),
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> AssetError + '_ {
    move |source| AssetError::Io { path: path.to_path_buf(), source }
}

/// Read-only source of trained-data blobs, addressed by file name.
pub trait AssetBundle: Send + Sync {
    fn open(&self, name: &str) -> Result<Box<dyn Read + '_>, AssetError>;
    fn contains(&self, name: &str) -> bool;
}

/// Blobs shipped as plain files in a directory.
pub struct DirBundle {
    root: PathBuf,
}

impl DirBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetBundle for DirBundle {
    fn open(&self, name: &str) -> Result<Box<dyn Read + '_>, AssetError> {
        let path = self.root.join(name);
        match fs::File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(AssetError::BundleMissing(name.to_string()))
            }
            Err(e) => Err(io_err(&path)(e)),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.root.join(name).is_file()
    }
}

/// Blobs held in memory, e.g. embedded with `include_bytes!`.
#[derive(Default)]
pub struct MemoryBundle {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.blobs.insert(name.into(), bytes.into());
    }
}

impl AssetBundle for MemoryBundle {
    fn open(&self, name: &str) -> Result<Box<dyn Read + '_>, AssetError> {
        self.blobs
            .get(name)
            .map(|bytes| Box::new(bytes.as_slice()) as Box<dyn Read + '_>)
            .ok_or_else(|| AssetError::BundleMissing(name.to_string()))
    }

    fn contains(&self, name: &str) -> bool {
        self.blobs.contains_key(name)
    }
}

/// One model file after `ensure`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    /// `true` if this call copied the file; `false` if it was already present.
    pub written: bool,
    /// SHA-256 of the copied bytes, only known when `written`.
    pub sha256: Option<String>,
}

/// Keeps `<download_dir>/tessdata/` populated with the models the engine needs.
pub struct AssetManager {
    download_dir: PathBuf,
    bundle: Box<dyn AssetBundle>,
}

impl AssetManager {
    pub fn new(download_dir: impl Into<PathBuf>, bundle: impl AssetBundle + 'static) -> Self {
        Self { download_dir: download_dir.into(), bundle: Box::new(bundle) }
    }

    /// The directory handed to the engine; it appends `tessdata/` itself.
    pub fn data_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn tessdata_dir(&self) -> PathBuf {
        self.download_dir.join(TESSDATA_DIR)
    }

    /// Stage every model file `language` needs that is not already on disk.
    ///
    /// Nothing is copied unless the bundle holds every required file.
    pub fn ensure(&self, language: &Language) -> Result<Vec<StagedFile>, AssetError> {
        let files = language.required_files();
        if let Some(missing) = files.iter().find(|name| !self.bundle.contains(name)) {
            return Err(AssetError::BundleMissing(missing.clone()));
        }
        let dir = self.prepare_dir()?;
        files.iter().map(|name| self.stage(&dir, name)).collect()
    }

    /// Whether every staged file for `language` byte-equals its bundle source.
    pub fn verify(&self, language: &Language) -> Result<bool, AssetError> {
        let dir = self.tessdata_dir();
        for name in language.required_files() {
            let target = dir.join(&name);
            if !target.is_file() {
                return Ok(false);
            }
            let staged = hash::sha256_file(&target).map_err(io_err(&target))?;
            let source = hash::sha256_reader(self.bundle.open(&name)?)
                .map_err(io_err(&target))?;
            if staged != source {
                tracing::warn!("Staged model differs from bundle: {}", target.display());
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn prepare_dir(&self) -> Result<PathBuf, AssetError> {
        let dir = self.tessdata_dir();
        if dir.is_dir() {
            return Ok(dir);
        }
        if dir.exists() {
            tracing::warn!("Replacing non-directory at {}", dir.display());
            fs::remove_file(&dir).map_err(io_err(&dir))?;
        }
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        Ok(dir)
    }

    fn stage(&self, dir: &Path, name: &str) -> Result<StagedFile, AssetError> {
        let target = dir.join(name);
        match fs::metadata(&target) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {
                tracing::debug!("Trained data already present: {}", target.display());
                return Ok(StagedFile { path: target, written: false, sha256: None });
            }
            // A zero-length file can only be the leftover of an interrupted copy.
            Ok(meta) if meta.is_file() => {
                tracing::warn!("Removing empty trained data file: {}", target.display());
                fs::remove_file(&target).map_err(io_err(&target))?;
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(&target)(e)),
        }

        let mut source = self.bundle.open(name)?;

        // Copy into a sibling temp file so the target name only ever holds a
        // complete model.
        let tmp = NamedTempFile::new_in(dir).map_err(io_err(dir))?;
        let mut writer = DigestWriter::new(BufWriter::new(tmp));
        io::copy(&mut source, &mut writer).map_err(io_err(&target))?;
        let (buffered, digest) = writer.finish();
        let tmp = buffered
            .into_inner()
            .map_err(|e| io_err(&target)(e.into_error()))?;
        tmp.as_file().sync_all().map_err(io_err(&target))?;

        match tmp.persist_noclobber(&target) {
            Ok(_) => {
                let sha256 = hash::to_hex(&digest);
                tracing::info!("Staged trained data {} (sha256 {sha256})", target.display());
                Ok(StagedFile { path: target, written: true, sha256: Some(sha256) })
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                tracing::debug!("Trained data staged concurrently: {}", target.display());
                Ok(StagedFile { path: target, written: false, sha256: None })
            }
            Err(e) => Err(io_err(&target)(e.error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle() -> MemoryBundle {
        MemoryBundle::new()
            .with("num.traineddata", b"NUM-MODEL".to_vec())
            .with("eng.traineddata", b"ENG-MODEL".to_vec())
            .with("chi_sim.traineddata", b"CHI-SIM-MODEL".to_vec())
            .with("chi_sim_vert.traineddata", b"CHI-SIM-VERT-MODEL".to_vec())
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn ensure_copies_model_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = AssetManager::new(dir.path(), bundle());

        let staged = mgr.ensure(&Language::num()).unwrap();

        assert_eq!(staged.len(), 1);
        assert!(staged[0].written);
        let target = dir.path().join("tessdata/num.traineddata");
        assert_eq!(staged[0].path, target);
        assert_eq!(fs::read(&target).unwrap(), b"NUM-MODEL");
        assert_eq!(
            staged[0].sha256.as_deref(),
            Some(hash::to_hex(&hash::sha256_reader(&b"NUM-MODEL"[..]).unwrap()).as_str())
        );
        assert_eq!(dir_entries(&mgr.tessdata_dir()), vec!["num.traineddata"]);
    }

    #[test]
    fn cjk_language_stages_vertical_companion() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = AssetManager::new(dir.path(), bundle());

        mgr.ensure(&Language::chi_sim()).unwrap();

        assert_eq!(
            dir_entries(&mgr.tessdata_dir()),
            vec!["chi_sim.traineddata", "chi_sim_vert.traineddata"]
        );
        assert_eq!(
            fs::read(dir.path().join("tessdata/chi_sim_vert.traineddata")).unwrap(),
            b"CHI-SIM-VERT-MODEL"
        );
    }

    #[test]
    fn joined_language_stages_each_model() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = AssetManager::new(dir.path(), bundle());

        let staged = mgr.ensure(&Language::new("eng+chi_sim").unwrap()).unwrap();

        assert_eq!(staged.len(), 3);
        assert_eq!(
            dir_entries(&mgr.tessdata_dir()),
            vec!["chi_sim.traineddata", "chi_sim_vert.traineddata", "eng.traineddata"]
        );
    }

    #[test]
    fn ensure_is_idempotent_and_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("tessdata/eng.traineddata");

        AssetManager::new(dir.path(), bundle()).ensure(&Language::eng()).unwrap();
        let mtime = fs::metadata(&target).unwrap().modified().unwrap();

        // A different bundle must not replace the already-staged file.
        let other = MemoryBundle::new().with("eng.traineddata", b"NEWER".to_vec());
        let staged = AssetManager::new(dir.path(), other).ensure(&Language::eng()).unwrap();

        assert!(!staged[0].written);
        assert_eq!(staged[0].sha256, None);
        assert_eq!(fs::read(&target).unwrap(), b"ENG-MODEL");
        assert_eq!(fs::metadata(&target).unwrap().modified().unwrap(), mtime);
    }

    #[test]
    fn missing_bundle_entry_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = AssetManager::new(dir.path(), bundle());

        let err = mgr.ensure(&Language::new("deu").unwrap()).unwrap_err();

        assert!(matches!(err, AssetError::BundleMissing(ref name) if name == "deu.traineddata"));
        assert!(!mgr.tessdata_dir().exists());
    }

    #[test]
    fn missing_vertical_companion_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let only_main = MemoryBundle::new().with("chi_tra.traineddata", b"TRA".to_vec());
        let mgr = AssetManager::new(dir.path(), only_main);

        let err = mgr.ensure(&Language::new("chi_tra").unwrap()).unwrap_err();

        assert!(matches!(err, AssetError::BundleMissing(ref name) if name == "chi_tra_vert.traineddata"));
        assert!(!mgr.tessdata_dir().join("chi_tra.traineddata").exists());
    }

    /// Yields a few bytes, then fails.
    struct BrokenReader {
        sent: bool,
    }

    impl Read for BrokenReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.sent {
                return Err(io::Error::other("read failed mid-copy"));
            }
            self.sent = true;
            let n = buf.len().min(4);
            buf[..n].copy_from_slice(&b"PART"[..n]);
            Ok(n)
        }
    }

    struct BrokenBundle;

    impl AssetBundle for BrokenBundle {
        fn open(&self, _name: &str) -> Result<Box<dyn Read + '_>, AssetError> {
            Ok(Box::new(BrokenReader { sent: false }))
        }

        fn contains(&self, _name: &str) -> bool {
            true
        }
    }

    #[test]
    fn failed_copy_leaves_no_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = AssetManager::new(dir.path(), BrokenBundle);

        let err = mgr.ensure(&Language::num()).unwrap_err();

        assert!(matches!(err, AssetError::Io { ref path, .. } if path.ends_with("num.traineddata")));
        assert!(dir_entries(&mgr.tessdata_dir()).is_empty());

        // A later call with a healthy bundle stages normally.
        let staged = AssetManager::new(dir.path(), bundle()).ensure(&Language::num()).unwrap();
        assert!(staged[0].written);
        assert_eq!(dir_entries(&mgr.tessdata_dir()), vec!["num.traineddata"]);
    }

    #[test]
    fn file_in_place_of_tessdata_dir_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tessdata"), b"not a directory").unwrap();
        let mgr = AssetManager::new(dir.path(), bundle());

        mgr.ensure(&Language::num()).unwrap();

        assert!(mgr.tessdata_dir().is_dir());
        assert!(mgr.tessdata_dir().join("num.traineddata").is_file());
    }

    #[test]
    fn empty_leftover_file_is_restaged() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("tessdata")).unwrap();
        let target = dir.path().join("tessdata/num.traineddata");
        fs::write(&target, b"").unwrap();

        let staged = AssetManager::new(dir.path(), bundle()).ensure(&Language::num()).unwrap();

        assert!(staged[0].written);
        assert_eq!(fs::read(&target).unwrap(), b"NUM-MODEL");
    }

    #[test]
    fn verify_detects_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = AssetManager::new(dir.path(), bundle());

        assert!(!mgr.verify(&Language::chi_sim()).unwrap());
        mgr.ensure(&Language::chi_sim()).unwrap();
        assert!(mgr.verify(&Language::chi_sim()).unwrap());

        fs::write(mgr.tessdata_dir().join("chi_sim_vert.traineddata"), b"corrupt").unwrap();
        assert!(!mgr.verify(&Language::chi_sim()).unwrap());
    }

    #[test]
    fn data_dir_is_parent_of_tessdata() {
        let mgr = AssetManager::new("/data/app/downloads", MemoryBundle::new());
        assert_eq!(mgr.data_dir(), Path::new("/data/app/downloads"));
        assert_eq!(mgr.tessdata_dir(), PathBuf::from("/data/app/downloads/tessdata"));
    }

    #[test]
    fn dir_bundle_reads_files_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("eng.traineddata"), b"ENG").unwrap();
        let bundle = DirBundle::new(dir.path());

        assert!(bundle.contains("eng.traineddata"));
        assert!(!bundle.contains("num.traineddata"));
        let mut buf = Vec::new();
        bundle.open("eng.traineddata").unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"ENG");
        assert!(matches!(
            bundle.open("num.traineddata"),
            Err(AssetError::BundleMissing(_))
        ));
    }
}
