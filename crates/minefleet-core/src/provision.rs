//! Provisioning pipeline
//!
//! Ordered remote steps that install, upgrade or configure a device. Each
//! step is preceded by a pause checkpoint. Remote command failures are
//! retried and logged but do not stop the run; only missing artifacts and
//! a failing vendor installer abort it.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use tracing::{info, instrument};

use minefleet_exec::shell_quote;

use crate::config::{ArtifactPaths, InstallParams, InstallStrategy, VendorInstaller};
use crate::device::DeviceController;
use crate::error::ProvisionError;

/// Scratch directory on the device
pub const SCRATCH_DIR: &str = "/tmp/bos_upgrade";

/// Entry script inside the firmware bundle
const INSTALL_SCRIPT: &str = "stage1.sh";

/// Compatibility binaries pushed before install: file name in the system
/// artifact directory, destination on the device
const COMPAT_BINARIES: [(&str, &str); 3] = [
    ("ld-musl-armhf.so.1", "/lib/ld-musl-armhf.so.1"),
    ("sftp-server", "/usr/lib/openssh/sftp-server"),
    ("fw_printenv", "/usr/sbin/fw_printenv"),
];

/// Where the upgrade bundle lands on the device
const UPDATE_TARGET: &str = "/tmp/firmware.tar";

const REFERRAL_TARGET: &str = "/tmp/referral.ipk";
const MINER_CONFIG_TARGET: &str = "/etc/bosminer.toml";

/// Progress reported after each install interval
const INSTALL_PROGRESS: [u8; 4] = [25, 50, 75, 100];

/// Random hardware identifier: 12 bytes, base64 with `+` and `/` replaced
/// so the result is alphanumeric
pub fn generate_hwid<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; 12];
    rng.fill_bytes(&mut bytes);
    STANDARD.encode(bytes).replace('+', "a").replace('/', "b")
}

/// Provisioning steps run on behalf of one device
pub struct ProvisioningPipeline<'a> {
    device: &'a DeviceController,
}

impl<'a> ProvisioningPipeline<'a> {
    pub fn new(device: &'a DeviceController) -> Self {
        Self { device }
    }

    /// Install managed firmware with the configured strategy
    ///
    /// # Errors
    /// Returns `ProvisionError` if an artifact is missing or the vendor
    /// installer fails.
    #[instrument(skip(self), fields(address = %self.device.address()))]
    pub async fn install(&self) -> Result<(), ProvisionError> {
        match &self.device.settings().provisioning.install {
            InstallStrategy::Scripted(params) => self.install_scripted(params).await,
            InstallStrategy::Vendor(installer) => self.install_vendor(installer).await,
        }
    }

    async fn install_scripted(&self, params: &InstallParams) -> Result<(), ProvisionError> {
        let device = self.device;
        let artifacts = &device.settings().artifacts;
        let firmware_dir = ArtifactPaths::require(&artifacts.firmware_dir)?;
        for (name, _) in COMPAT_BINARIES {
            ArtifactPaths::require(&artifacts.system_dir.join(name))?;
        }

        device.log("Installing...").await;

        device.checkpoint().await;
        device
            .remote(&format!("rm -rf {SCRATCH_DIR} && mkdir -p {SCRATCH_DIR}"))
            .await;

        for (name, target) in COMPAT_BINARIES {
            device.checkpoint().await;
            device.push_file(&artifacts.system_dir.join(name), target).await;
            device.checkpoint().await;
            device.remote(&format!("chmod +x {target}")).await;
        }

        device.checkpoint().await;
        device.push_dir(firmware_dir, SCRATCH_DIR).await;

        device.checkpoint().await;
        device
            .remote(&format!("chmod +x {SCRATCH_DIR}/{INSTALL_SCRIPT}"))
            .await;

        device.checkpoint().await;
        device
            .remote("ln -fs /usr/sbin/fw_printenv /usr/sbin/fw_setenv")
            .await;

        let hwid = generate_hwid(&mut rand::thread_rng());
        let args = std::iter::once(hwid)
            .chain(params.script_args())
            .map(|arg| shell_quote(&arg))
            .collect::<Vec<_>>()
            .join(" ");

        device.checkpoint().await;
        device.log("Running installer...").await;
        device
            .remote(&format!(
                "cd {SCRATCH_DIR} && /bin/sh {INSTALL_SCRIPT} {args} && sync && reboot"
            ))
            .await;

        self.await_reboot().await;
        Ok(())
    }

    async fn install_vendor(&self, installer: &VendorInstaller) -> Result<(), ProvisionError> {
        let device = self.device;
        device.log("Installing...").await;
        device.checkpoint().await;

        let args = installer.args_for(device.address());
        let result = device
            .deps()
            .tools
            .run(&installer.program, &args)
            .await
            .map_err(|e| ProvisionError::Installer(e.to_string()))?;

        if !result.success() {
            return Err(ProvisionError::InstallerFailed {
                status: result.status,
                output: result.combined_output().trim().to_string(),
            });
        }

        self.await_reboot().await;
        Ok(())
    }

    /// Report progress over the fixed install intervals, then wait for the
    /// device to come back
    async fn await_reboot(&self) {
        let device = self.device;
        let timings = device.settings().timings;

        for percent in INSTALL_PROGRESS {
            tokio::time::sleep(timings.install_progress).await;
            device.checkpoint().await;
            device.log(format!("Installing... {percent}%")).await;
        }

        device.log("Waiting for reboot...").await;
        device.wait_for_return().await;
        tokio::time::sleep(timings.install_grace).await;

        info!(address = %device.address(), "install finished");
        device.log("Installed").await;
    }

    /// Upgrade an older managed firmware in place
    #[instrument(skip(self), fields(address = %self.device.address()))]
    pub async fn update(&self) {
        let device = self.device;
        let settings = device.settings();

        device.log("Updating...").await;

        device.checkpoint().await;
        device
            .push_file(&settings.artifacts.update_bundle, UPDATE_TARGET)
            .await;

        device.checkpoint().await;
        device.remote(&format!("sysupgrade {UPDATE_TARGET}")).await;

        device.settle(settings.timings.update_settle).await;
        device.log("Updated").await;
    }

    /// Install the referral package and mining configuration, then restart
    /// the mining daemon
    #[instrument(skip(self), fields(address = %self.device.address()))]
    pub async fn configure(&self) {
        let device = self.device;
        let artifacts = &device.settings().artifacts;

        device.log("Configuring...").await;

        device.checkpoint().await;
        device
            .push_file(&artifacts.referral_package, REFERRAL_TARGET)
            .await;

        device.checkpoint().await;
        device
            .push_file(&artifacts.referral_config, MINER_CONFIG_TARGET)
            .await;

        device.checkpoint().await;
        device
            .remote(&format!("opkg install {REFERRAL_TARGET}"))
            .await;

        device.checkpoint().await;
        device.remote("/etc/init.d/bosminer restart").await;

        device.log("Configured").await;
    }
}
