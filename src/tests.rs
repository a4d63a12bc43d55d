#[cfg(test)]
mod tests {
    use crate::config::{environ, HubConfig};
    use crate::errors::HubError;
    use crate::filesystem::{executable_name, HubLocalFilesystem};
    use crate::platform;
    use crate::record::{read_record, Environ};
    use crate::restart::{
        bootstrap, BootstrapOutcome, Invocation, ProcessLauncher, RestartRequest,
    };
    use crate::types::{InstallRecord, VendorRecord};
    use crate::vendors::sync::{SystemDriver, VendorDriver};
    use crate::vendors::VendorInstaller;
    use anyhow::Result;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::{tempdir, TempDir};

    #[derive(Default)]
    struct MockLauncher {
        requests: Vec<RestartRequest>,
    }

    impl ProcessLauncher for MockLauncher {
        fn replace(&mut self, request: &RestartRequest) -> Result<i32> {
            self.requests.push(request.clone());
            Ok(0)
        }
    }

    #[derive(Default)]
    struct CountingDriver {
        installs: Vec<String>,
    }

    impl VendorDriver for CountingDriver {
        async fn install(&mut self, vendor: &VendorInstaller) -> Result<()> {
            self.installs.push(vendor.name().to_string());
            vendor.install().await
        }

        fn uninstall(&mut self, paths: &[PathBuf]) -> Result<()> {
            SystemDriver.uninstall(paths)
        }
    }

    struct Scenario {
        root: TempDir,
    }

    impl Scenario {
        fn new() -> Self {
            let root = tempdir().unwrap();
            let dist = root.path().join("dist");
            fs::create_dir_all(&dist).unwrap();
            fs::write(dist.join(executable_name("1.0.0")), "#!/bin/sh\n").unwrap();

            let manifest = root.path().join("vendors.json");
            fs::write(
                &manifest,
                r#"{"workspace": {"version": 1, "install_dir": "$SCENARIO_ROOT/vendors/workspace", "dirs_to_make": ["$SCENARIO_ROOT/projects"]}}"#,
            )
            .unwrap();
            Self { root }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.root.path().join(name)
        }

        fn install_dir(&self) -> PathBuf {
            self.path("local")
        }

        fn environ(&self, extra: &[(&str, &str)]) -> Environ {
            let mut environ = Environ::new();
            let root = self.root.path().to_string_lossy().to_string();
            environ.insert("SCENARIO_ROOT".to_string(), root);
            environ.insert(
                environ::LOCAL_INSTALL_PATH.to_string(),
                self.install_dir().to_string_lossy().to_string(),
            );
            environ.insert(
                environ::DATA_ROOT.to_string(),
                self.path("data").to_string_lossy().to_string(),
            );
            environ.insert(
                environ::VENDOR_INSTALLERS_CONFIG.to_string(),
                self.path("vendors.json").to_string_lossy().to_string(),
            );
            for (key, value) in extra {
                environ.insert(key.to_string(), value.to_string());
            }
            environ
        }

        fn installer(&self, version: &str) -> String {
            format!("{}={}", version, self.path("dist").display())
        }

        fn config(&self, extra: &[(&str, &str)]) -> HubConfig {
            HubConfig::from_environ(self.environ(extra)).unwrap()
        }

        fn layout(&self, config: &HubConfig) -> HubLocalFilesystem {
            HubLocalFilesystem::from_config(config).unwrap()
        }

        fn outside(&self, restarted: u32) -> Invocation {
            Invocation {
                executable: self.path("dist").join(executable_name("1.0.0")),
                argv: vec!["about".to_string()],
                restarted,
                force_local_restart: false,
            }
        }

        fn local(&self, restarted: u32) -> Invocation {
            Invocation {
                executable: self.install_dir().join(executable_name("1.0.0")),
                argv: vec!["about".to_string()],
                restarted,
                force_local_restart: false,
            }
        }

        fn hub_record(&self, config: &HubConfig) -> InstallRecord {
            read_record(&self.layout(config).install_record_path(), &Environ::new()).unwrap()
        }
    }

    #[tokio::test]
    async fn test_first_launch_installs_then_restarts() {
        let scenario = Scenario::new();
        let installer = scenario.installer("v1");
        let config = scenario.config(&[(environ::INSTALLER, &installer)]);
        let layout = scenario.layout(&config);
        let mut launcher = MockLauncher::default();
        let mut driver = CountingDriver::default();

        let outcome = bootstrap(&config, &layout, &scenario.outside(0), &mut launcher, &mut driver)
            .await
            .unwrap();
        assert_eq!(outcome, BootstrapOutcome::Exit(0));

        let record = scenario.hub_record(&config);
        assert_eq!(record.installed_version.get().map(String::as_str), Some("v1"));
        assert_eq!(record.installed_path.get(), Some(&scenario.install_dir()));

        assert_eq!(launcher.requests.len(), 1);
        let request = &launcher.requests[0];
        assert_eq!(
            request.exe,
            scenario.install_dir().join(executable_name("1.0.0"))
        );
        assert_eq!(request.args, vec!["--restarted__", "1", "about"]);
        // vendors are synchronized by the restarted process only
        assert!(driver.installs.is_empty());

        // the replaced process
        let restarted_config = scenario.config(&[
            (environ::INSTALLER, &installer),
            (environ::RESTARTED, "1"),
        ]);
        let outcome = bootstrap(
            &restarted_config,
            &layout,
            &scenario.local(1),
            &mut launcher,
            &mut driver,
        )
        .await
        .unwrap();
        assert_eq!(outcome, BootstrapOutcome::Ready);
        assert_eq!(launcher.requests.len(), 1);
        assert_eq!(driver.installs, vec!["workspace"]);
        assert!(scenario.path("projects").is_dir());

        let record = scenario.hub_record(&config);
        let vendor_record_path = scenario.path("vendors/workspace/.vendorrecord");
        assert_eq!(
            record.vendor_records.get().unwrap().get("workspace"),
            Some(&vendor_record_path)
        );
        assert_eq!(record.installed_version.get().map(String::as_str), Some("v1"));
        let vendor: VendorRecord = read_record(&vendor_record_path, &Environ::new()).unwrap();
        assert_eq!(vendor.name.get().map(String::as_str), Some("workspace"));
    }

    #[tokio::test]
    async fn test_up_to_date_install_is_reused() {
        let scenario = Scenario::new();
        let installer = scenario.installer("v1");
        let config = scenario.config(&[(environ::INSTALLER, &installer)]);
        let layout = scenario.layout(&config);
        let mut launcher = MockLauncher::default();
        let mut driver = CountingDriver::default();

        bootstrap(&config, &layout, &scenario.outside(0), &mut launcher, &mut driver)
            .await
            .unwrap();
        fs::write(scenario.install_dir().join("marker"), "").unwrap();

        bootstrap(&config, &layout, &scenario.outside(0), &mut launcher, &mut driver)
            .await
            .unwrap();
        assert!(scenario.install_dir().join("marker").exists());
        assert_eq!(launcher.requests.len(), 2);
        assert_eq!(launcher.requests[0], launcher.requests[1]);
    }

    #[tokio::test]
    async fn test_new_version_reinstalls() {
        let scenario = Scenario::new();
        let layout_config = scenario.config(&[]);
        let layout = scenario.layout(&layout_config);
        let mut launcher = MockLauncher::default();
        let mut driver = CountingDriver::default();

        let v1 = scenario.config(&[(environ::INSTALLER, &scenario.installer("v1"))]);
        bootstrap(&v1, &layout, &scenario.outside(0), &mut launcher, &mut driver)
            .await
            .unwrap();
        fs::write(scenario.install_dir().join("marker"), "").unwrap();

        let v2 = scenario.config(&[(environ::INSTALLER, &scenario.installer("v2"))]);
        bootstrap(&v2, &layout, &scenario.outside(0), &mut launcher, &mut driver)
            .await
            .unwrap();
        assert!(!scenario.install_dir().join("marker").exists());
        assert_eq!(
            scenario.hub_record(&v2).installed_version.get().map(String::as_str),
            Some("v2")
        );
    }

    #[tokio::test]
    async fn test_failed_update_keeps_working_install() {
        let scenario = Scenario::new();
        let layout_config = scenario.config(&[]);
        let layout = scenario.layout(&layout_config);
        let mut launcher = MockLauncher::default();
        let mut driver = CountingDriver::default();

        let v1 = scenario.config(&[(environ::INSTALLER, &scenario.installer("v1"))]);
        bootstrap(&v1, &layout, &scenario.outside(0), &mut launcher, &mut driver)
            .await
            .unwrap();
        let exe = scenario.install_dir().join(executable_name("1.0.0"));
        assert!(exe.is_file());

        // the share holding v2 is unreachable
        let offline = format!("v2={}", scenario.path("offline-share").display());
        let v2 = scenario.config(&[(environ::INSTALLER, &offline)]);
        let err = bootstrap(&v2, &layout, &scenario.outside(0), &mut launcher, &mut driver)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HubError>(),
            Some(HubError::InstallerSourceMissing(_))
        ));

        // a distribution without a hub executable
        let broken = scenario.path("broken");
        fs::create_dir_all(&broken).unwrap();
        fs::write(broken.join("readme.txt"), "").unwrap();
        let v3 = scenario.config(&[(
            environ::INSTALLER,
            &format!("v3={}", broken.display()),
        )]);
        bootstrap(&v3, &layout, &scenario.outside(0), &mut launcher, &mut driver)
            .await
            .unwrap_err();

        assert!(exe.is_file());
        assert_eq!(
            scenario.hub_record(&v1).installed_version.get().map(String::as_str),
            Some("v1")
        );
        assert_eq!(launcher.requests.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_executable_heals_install() {
        let scenario = Scenario::new();
        let installer = scenario.installer("v1");
        let config = scenario.config(&[(environ::INSTALLER, &installer)]);
        let layout = scenario.layout(&config);
        let mut launcher = MockLauncher::default();
        let mut driver = CountingDriver::default();

        bootstrap(&config, &layout, &scenario.outside(0), &mut launcher, &mut driver)
            .await
            .unwrap();
        let exe = scenario.install_dir().join(executable_name("1.0.0"));
        fs::remove_file(&exe).unwrap();

        let outcome = bootstrap(&config, &layout, &scenario.outside(0), &mut launcher, &mut driver)
            .await
            .unwrap();
        assert_eq!(outcome, BootstrapOutcome::Exit(0));
        assert!(exe.is_file());
    }

    #[tokio::test]
    async fn test_corrupt_record_triggers_install() {
        let scenario = Scenario::new();
        let installer = scenario.installer("v1");
        let config = scenario.config(&[(environ::INSTALLER, &installer)]);
        let layout = scenario.layout(&config);
        fs::create_dir_all(&layout.root_dir).unwrap();
        fs::write(layout.install_record_path(), "{ garbage").unwrap();

        let mut launcher = MockLauncher::default();
        bootstrap(
            &config,
            &layout,
            &scenario.outside(0),
            &mut launcher,
            &mut CountingDriver::default(),
        )
        .await
        .unwrap();
        assert_eq!(
            scenario.hub_record(&config).installed_version.get().map(String::as_str),
            Some("v1")
        );
    }

    #[tokio::test]
    async fn test_direct_local_launch_is_refused() {
        let scenario = Scenario::new();
        let config = scenario.config(&[]);
        let layout = scenario.layout(&config);
        let mut driver = CountingDriver::default();

        let err = bootstrap(
            &config,
            &layout,
            &scenario.local(0),
            &mut MockLauncher::default(),
            &mut driver,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HubError>(),
            Some(HubError::DirectLocalLaunch)
        ));
        assert!(driver.installs.is_empty());
        assert!(!layout.install_record_path().exists());

        let skipping = scenario.config(&[(environ::SKIP_LOCAL_CHECK, "1")]);
        let outcome = bootstrap(
            &skipping,
            &layout,
            &scenario.local(0),
            &mut MockLauncher::default(),
            &mut driver,
        )
        .await
        .unwrap();
        assert_eq!(outcome, BootstrapOutcome::Ready);
    }

    #[tokio::test]
    async fn test_no_installer_runs_in_place() {
        let scenario = Scenario::new();
        let config = scenario.config(&[]);
        let layout = scenario.layout(&config);
        let mut launcher = MockLauncher::default();
        let mut driver = CountingDriver::default();

        let outcome = bootstrap(&config, &layout, &scenario.outside(0), &mut launcher, &mut driver)
            .await
            .unwrap();
        assert_eq!(outcome, BootstrapOutcome::Ready);
        assert!(launcher.requests.is_empty());
        assert_eq!(driver.installs, vec!["workspace"]);
        assert!(!scenario.install_dir().exists());
    }

    #[tokio::test]
    async fn test_force_local_restart() {
        let scenario = Scenario::new();
        let installer = scenario.installer("v1");
        let config = scenario.config(&[(environ::INSTALLER, &installer)]);
        let layout = scenario.layout(&config);
        let mut launcher = MockLauncher::default();
        let mut driver = CountingDriver::default();

        bootstrap(&config, &layout, &scenario.outside(0), &mut launcher, &mut driver)
            .await
            .unwrap();

        let invocation = Invocation {
            argv: vec![
                "--restarted__".to_string(),
                "1".to_string(),
                "--force-local-restart".to_string(),
            ],
            force_local_restart: true,
            ..scenario.local(1)
        };
        let outcome = bootstrap(&config, &layout, &invocation, &mut launcher, &mut driver)
            .await
            .unwrap();
        assert_eq!(outcome, BootstrapOutcome::Exit(0));
        let request = launcher.requests.last().unwrap();
        assert_eq!(request.args, vec!["--restarted__", "2"]);
        assert!(driver.installs.is_empty());
    }

    #[tokio::test]
    async fn test_restart_limit_stops_loop() {
        let scenario = Scenario::new();
        let installer = scenario.installer("v1");
        let config = scenario.config(&[(environ::INSTALLER, &installer)]);
        let layout = scenario.layout(&config);
        let mut launcher = MockLauncher::default();

        let err = bootstrap(
            &config,
            &layout,
            &scenario.outside(4),
            &mut launcher,
            &mut CountingDriver::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HubError>(),
            Some(HubError::RestartLimitExceeded(4))
        ));
        assert!(launcher.requests.is_empty());
        assert!(!scenario.install_dir().exists());
        assert!(!layout.install_record_path().exists());
    }

    #[tokio::test]
    async fn test_invalid_manifest_fails_before_install() {
        let scenario = Scenario::new();
        fs::write(
            scenario.path("vendors.json"),
            r#"{"houdini": {"version": 1, "install_dir": "/opt/houdini"}}"#,
        )
        .unwrap();
        let installer = scenario.installer("v1");
        let config = scenario.config(&[(environ::INSTALLER, &installer)]);
        let layout = scenario.layout(&config);
        let mut launcher = MockLauncher::default();

        let err = bootstrap(
            &config,
            &layout,
            &scenario.outside(0),
            &mut launcher,
            &mut CountingDriver::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HubError>(),
            Some(HubError::UnsupportedVendor { .. })
        ));
        assert!(!scenario.install_dir().exists());
        assert!(!layout.install_record_path().exists());
        assert!(launcher.requests.is_empty());
    }

    #[test]
    fn test_platform_info() {
        let info = platform::get_system_info();
        assert!(!info.os.is_empty());
        assert!(!info.arch.is_empty());
    }

    #[test]
    fn test_data_root_override() {
        let scenario = Scenario::new();
        let config = scenario.config(&[]);
        let layout = scenario.layout(&config);
        assert_eq!(layout.root_dir, scenario.path("data"));
        assert_eq!(
            layout.install_record_path(),
            Path::new(&scenario.path("data")).join(".hubrecord")
        );
    }
}
