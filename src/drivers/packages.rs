//! Installation of the native support packages into a distribution.
//!
//! Every step is guarded by an existence check, so calling [`ensure_installed`] on an already prepared distribution
//! does nothing.

use std::{
    fs,
    path::{Path, PathBuf},
    process::Stdio,
};

use anyhow::Context;
use tokio::process::Command;

use crate::{
    benchmarks::script::SUPPORT_LIBRARIES,
    drivers::Distribution,
    errors::Error,
};

/// Source of a package to install.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageSource {
    /// Package name, as it appears in the library directory.
    pub name: &'static str,
    /// Package source directory, containing `DESCRIPTION` and `src/`.
    pub path: PathBuf,
}

/// Sources of the two support packages every driver script attaches.
///
/// `altreprffitests` ships with the FastR sources, `altrepbench` with this suite.
#[must_use]
pub fn support_packages(fastr_source: &Path, bench_package: &Path) -> [PackageSource; 2] {
    let [rffi_tests, bench] = SUPPORT_LIBRARIES;
    [
        PackageSource {
            name: rffi_tests,
            path: fastr_source
                .join("com.oracle.truffle.r.test.native")
                .join("packages")
                .join(rffi_tests)
                .join(rffi_tests),
        },
        PackageSource {
            name: bench,
            path: bench_package.to_path_buf(),
        },
    ]
}

/// Whether a package is present in the library directory of the distribution.
///
/// # Errors
///
/// If the library directory cannot be read.
pub fn is_installed(distribution: &Distribution, package: &str) -> anyhow::Result<bool> {
    let library = distribution.library_dir();
    if !library.is_dir() {
        return Ok(false);
    }
    for entry in fs::read_dir(&library)
        .with_context(|| format!("could not read library directory {}", library.display()))?
    {
        if entry?.file_name() == package {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Removes compiled objects (`*.o`, `*.so`) left in the package's `src/` directory.
///
/// Returns the number of removed files.
///
/// # Errors
///
/// If the package has no `src/` directory or a file cannot be removed.
pub fn clean(package: &Path) -> anyhow::Result<usize> {
    log::info!("cleaning package in {}...", package.display());
    let src = package.join("src");
    if !src.is_dir() {
        return Err(Error::MissingPath {
            what: "package src directory",
            path: src,
        }
        .into());
    }

    let mut removed = 0;
    for entry in fs::read_dir(&src).with_context(|| format!("could not read {}", src.display()))? {
        let path = entry?.path();
        let compiled = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("o" | "so")
        );
        if compiled && path.is_file() {
            log::debug!("removing {}", path.display());
            fs::remove_file(&path)
                .with_context(|| format!("could not remove {}", path.display()))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Runs `R CMD INSTALL` for the package.
///
/// # Errors
///
/// If the installer cannot be launched or exits unsuccessfully.
pub async fn install(distribution: &Distribution, package: &Path) -> anyhow::Result<()> {
    let package = package
        .canonicalize()
        .with_context(|| format!("could not canonicalize {}", package.display()))?;
    log::info!(
        "[{}] installing package {}...",
        distribution.driver,
        package.display()
    );

    let status = Command::new(distribution.executable())
        .arg("CMD")
        .arg("INSTALL")
        .arg(&package)
        .stdin(Stdio::null())
        .status()
        .await
        .with_context(|| {
            format!(
                "could not launch {}",
                distribution.executable().display()
            )
        })?;
    if !status.success() {
        return Err(Error::InstallFailed { package, status }.into());
    }

    log::info!("[{}] installed package {}", distribution.driver, package.display());
    Ok(())
}

/// Installs every package that is not yet present in the distribution.
///
/// # Errors
///
/// If a package source is missing, or cleaning or installing it fails.
pub async fn ensure_installed(
    distribution: &Distribution,
    packages: &[PackageSource],
) -> anyhow::Result<()> {
    for package in packages {
        if is_installed(distribution, package.name)? {
            log::debug!(
                "[{}] package {} is already installed",
                distribution.driver,
                package.name
            );
            continue;
        }
        if !package.path.is_dir() {
            return Err(Error::MissingPath {
                what: "package sources",
                path: package.path.clone(),
            }
            .into());
        }
        clean(&package.path)?;
        install(distribution, &package.path).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Driver;

    fn distribution(home: &Path) -> Distribution {
        Distribution {
            driver: Driver::Gnur,
            home: home.to_path_buf(),
        }
    }

    #[test]
    fn support_package_paths() {
        let [rffi, bench] = support_packages(
            Path::new("/src/fastr"),
            Path::new("/suite/native_bench_pkg"),
        );
        assert_eq!(rffi.name, "altreprffitests");
        assert_eq!(
            rffi.path,
            Path::new("/src/fastr/com.oracle.truffle.r.test.native/packages")
                .join("altreprffitests/altreprffitests")
        );
        assert_eq!(bench.name, "altrepbench");
        assert_eq!(bench.path, Path::new("/suite/native_bench_pkg"));
    }

    #[test]
    fn detects_installed_packages() {
        let home = tempfile::tempdir().unwrap();
        let distribution = distribution(home.path());
        assert!(!is_installed(&distribution, "altrepbench").unwrap());

        fs::create_dir_all(home.path().join("library").join("altrepbench")).unwrap();
        assert!(is_installed(&distribution, "altrepbench").unwrap());
        assert!(!is_installed(&distribution, "altreprffitests").unwrap());
    }

    #[test]
    fn clean_removes_only_compiled_objects() {
        let package = tempfile::tempdir().unwrap();
        let src = package.path().join("src");
        fs::create_dir_all(&src).unwrap();
        for name in ["bench.c", "bench.o", "altrepbench.so", "native_mem_vec.h"] {
            fs::write(src.join(name), "").unwrap();
        }

        assert_eq!(clean(package.path()).unwrap(), 2);
        assert!(src.join("bench.c").exists());
        assert!(src.join("native_mem_vec.h").exists());
        assert!(!src.join("bench.o").exists());
        assert!(!src.join("altrepbench.so").exists());
        assert_eq!(clean(package.path()).unwrap(), 0);
    }

    #[test]
    fn clean_requires_src() {
        let package = tempfile::tempdir().unwrap();
        let err = clean(package.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MissingPath { what: "package src directory", .. })
        ));
    }

    #[tokio::test]
    async fn installed_packages_are_skipped() {
        let home = tempfile::tempdir().unwrap();
        fs::create_dir_all(home.path().join("library").join("altrepbench")).unwrap();
        let packages = [PackageSource {
            name: "altrepbench",
            path: home.path().join("does-not-exist"),
        }];
        ensure_installed(&distribution(home.path()), &packages)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_sources_fail() {
        let home = tempfile::tempdir().unwrap();
        let packages = [PackageSource {
            name: "altrepbench",
            path: home.path().join("does-not-exist"),
        }];
        let err = ensure_installed(&distribution(home.path()), &packages)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MissingPath { what: "package sources", .. })
        ));
    }
}
