//! In-crate fakes for the external collaborators.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::cloud::{
    AccessPoint, AccessPointOptions, Cloud, CloudError, CloudFactory, FileSystem, MountTarget,
};
use crate::filesystem::{Mounter, OsClient};

/// Ordered names of every mounter and OS client call, shared between fakes.
pub type EventLog = Arc<Mutex<Vec<&'static str>>>;

fn record(log: Option<&EventLog>, event: &'static str) {
    if let Some(log) = log {
        log.lock().push(event);
    }
}

fn injected(op: &str) -> io::Error {
    io::Error::other(format!("injected {op} failure"))
}

/// Storage service fake with switchable failures.
#[derive(Default)]
pub struct FakeCloud {
    describe_fs_error: Mutex<Option<CloudError>>,
    create_error: Mutex<Option<CloudError>>,
    describe_ap_error: Mutex<Option<CloudError>>,
    delete_error: Mutex<Option<CloudError>>,
    mount_target_error: Mutex<Option<CloudError>>,
    create_hangs: Mutex<bool>,
    root_dir: Mutex<String>,
    created: Mutex<Vec<(String, AccessPointOptions)>>,
    access_points: Mutex<HashMap<String, AccessPoint>>,
    deleted: Mutex<Vec<String>>,
    mount_target_lookups: Mutex<Vec<(String, String)>>,
}

impl FakeCloud {
    pub fn fail_describe_file_system(&self, err: CloudError) {
        *self.describe_fs_error.lock() = Some(err);
    }

    pub fn fail_create(&self, err: CloudError) {
        *self.create_error.lock() = Some(err);
    }

    pub fn fail_describe_access_point(&self, err: CloudError) {
        *self.describe_ap_error.lock() = Some(err);
    }

    pub fn fail_delete(&self, err: CloudError) {
        *self.delete_error.lock() = Some(err);
    }

    pub fn fail_mount_targets(&self, err: CloudError) {
        *self.mount_target_error.lock() = Some(err);
    }

    /// Make every later create wait forever.
    pub fn hang_create(&self) {
        *self.create_hangs.lock() = true;
    }

    pub fn set_root_dir(&self, root_dir: &str) {
        *self.root_dir.lock() = root_dir.to_string();
    }

    /// Options of every successful create, in order.
    pub fn created(&self) -> Vec<AccessPointOptions> {
        self.created.lock().iter().map(|(_, o)| o.clone()).collect()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }

    /// `(file_system_id, az)` of every mount target lookup.
    pub fn mount_target_lookups(&self) -> Vec<(String, String)> {
        self.mount_target_lookups.lock().clone()
    }
}

#[async_trait]
impl Cloud for FakeCloud {
    async fn describe_file_system(&self, file_system_id: &str) -> Result<FileSystem, CloudError> {
        if let Some(err) = self.describe_fs_error.lock().clone() {
            return Err(err);
        }
        Ok(FileSystem {
            file_system_id: file_system_id.to_string(),
        })
    }

    async fn create_access_point(
        &self,
        name: &str,
        options: &AccessPointOptions,
    ) -> Result<AccessPoint, CloudError> {
        let hangs = *self.create_hangs.lock();
        if hangs {
            std::future::pending::<()>().await;
        }
        if let Some(err) = self.create_error.lock().clone() {
            return Err(err);
        }
        let mut created = self.created.lock();
        created.push((name.to_string(), options.clone()));
        let access_point = AccessPoint {
            access_point_id: format!("fsap-{:04}", created.len()),
            file_system_id: options.file_system_id.clone(),
            root_dir: options.directory_path.clone(),
            uid: options.uid,
            gid: options.gid,
        };
        self.access_points
            .lock()
            .insert(access_point.access_point_id.clone(), access_point.clone());
        Ok(access_point)
    }

    async fn describe_access_point(
        &self,
        access_point_id: &str,
    ) -> Result<AccessPoint, CloudError> {
        if let Some(err) = self.describe_ap_error.lock().clone() {
            return Err(err);
        }
        if let Some(access_point) = self.access_points.lock().get(access_point_id) {
            return Ok(access_point.clone());
        }
        Ok(AccessPoint {
            access_point_id: access_point_id.to_string(),
            file_system_id: "fs-abcd1234".to_string(),
            root_dir: self.root_dir.lock().clone(),
            ..AccessPoint::default()
        })
    }

    async fn delete_access_point(&self, access_point_id: &str) -> Result<(), CloudError> {
        if let Some(err) = self.delete_error.lock().clone() {
            return Err(err);
        }
        self.deleted.lock().push(access_point_id.to_string());
        Ok(())
    }

    async fn describe_mount_targets(
        &self,
        file_system_id: &str,
        az: &str,
    ) -> Result<MountTarget, CloudError> {
        self.mount_target_lookups
            .lock()
            .push((file_system_id.to_string(), az.to_string()));
        if let Some(err) = self.mount_target_error.lock().clone() {
            return Err(err);
        }
        Ok(MountTarget {
            az: if az.is_empty() { "us-east-1a".to_string() } else { az.to_string() },
            mount_target_id: "fsmt-1".to_string(),
            ip_address: "10.0.0.7".to_string(),
        })
    }
}

/// Hands out one shared client for any role, recording the roles asked for.
pub struct FakeCloudFactory {
    cloud: Arc<dyn Cloud>,
    roles: Mutex<Vec<String>>,
    fail: bool,
}

impl FakeCloudFactory {
    pub fn new(cloud: Arc<dyn Cloud>) -> Self {
        Self {
            cloud,
            roles: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing(cloud: Arc<dyn Cloud>) -> Self {
        Self {
            fail: true,
            ..Self::new(cloud)
        }
    }

    pub fn roles(&self) -> Vec<String> {
        self.roles.lock().clone()
    }
}

impl CloudFactory for FakeCloudFactory {
    fn with_role(&self, role_arn: &str) -> Result<Arc<dyn Cloud>, CloudError> {
        self.roles.lock().push(role_arn.to_string());
        if self.fail {
            return Err(CloudError::AccessDenied);
        }
        Ok(Arc::clone(&self.cloud))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountCall {
    MakeDir(PathBuf),
    Mount(String, PathBuf, Vec<String>),
    Unmount(PathBuf),
}

/// Mounter that records calls and never touches the host.
#[derive(Default)]
pub struct RecordingMounter {
    calls: Mutex<Vec<MountCall>>,
    fail_make_dir: bool,
    fail_mount: bool,
    fail_unmount: bool,
    log: Option<EventLog>,
}

impl RecordingMounter {
    #[must_use]
    pub fn failing_make_dir(mut self) -> Self {
        self.fail_make_dir = true;
        self
    }

    #[must_use]
    pub fn failing_mount(mut self) -> Self {
        self.fail_mount = true;
        self
    }

    #[must_use]
    pub fn failing_unmount(mut self) -> Self {
        self.fail_unmount = true;
        self
    }

    #[must_use]
    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn calls(&self) -> Vec<MountCall> {
        self.calls.lock().clone()
    }

    /// Options passed to the most recent mount.
    pub fn last_mount_options(&self) -> Option<Vec<String>> {
        self.calls.lock().iter().rev().find_map(|call| match call {
            MountCall::Mount(_, _, options) => Some(options.clone()),
            _ => None,
        })
    }
}

impl Mounter for RecordingMounter {
    fn make_dir(&self, path: &Path) -> io::Result<()> {
        record(self.log.as_ref(), "make_dir");
        self.calls.lock().push(MountCall::MakeDir(path.to_path_buf()));
        if self.fail_make_dir {
            return Err(injected("make_dir"));
        }
        Ok(())
    }

    fn mount(
        &self,
        source: &str,
        target: &Path,
        _fs_type: &str,
        options: &[String],
    ) -> io::Result<()> {
        record(self.log.as_ref(), "mount");
        self.calls.lock().push(MountCall::Mount(
            source.to_string(),
            target.to_path_buf(),
            options.to_vec(),
        ));
        if self.fail_mount {
            return Err(injected("mount"));
        }
        Ok(())
    }

    fn unmount(&self, target: &Path) -> io::Result<()> {
        record(self.log.as_ref(), "unmount");
        self.calls.lock().push(MountCall::Unmount(target.to_path_buf()));
        if self.fail_unmount {
            return Err(injected("unmount"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsCall {
    MkdirAll {
        path: PathBuf,
        mode: u32,
        uid: u32,
        gid: u32,
    },
    Remove(PathBuf),
    RemoveAll(PathBuf),
    OwnerGid(PathBuf),
}

/// OS client that records calls and never touches the host.
#[derive(Default)]
pub struct FakeOsClient {
    calls: Mutex<Vec<OsCall>>,
    fail_mkdir: bool,
    fail_remove: bool,
    fail_remove_all: bool,
    log: Option<EventLog>,
}

impl FakeOsClient {
    #[must_use]
    pub fn failing_mkdir(mut self) -> Self {
        self.fail_mkdir = true;
        self
    }

    #[must_use]
    pub fn failing_remove(mut self) -> Self {
        self.fail_remove = true;
        self
    }

    #[must_use]
    pub fn failing_remove_all(mut self) -> Self {
        self.fail_remove_all = true;
        self
    }

    #[must_use]
    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn calls(&self) -> Vec<OsCall> {
        self.calls.lock().clone()
    }

    /// Paths passed to `remove`.
    pub fn removed(&self) -> Vec<PathBuf> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                OsCall::Remove(path) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }
}

impl OsClient for FakeOsClient {
    fn mkdir_all_with_owner(&self, path: &Path, mode: u32, uid: u32, gid: u32) -> io::Result<()> {
        record(self.log.as_ref(), "mkdir_all");
        self.calls.lock().push(OsCall::MkdirAll {
            path: path.to_path_buf(),
            mode,
            uid,
            gid,
        });
        if self.fail_mkdir {
            return Err(injected("mkdir"));
        }
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        record(self.log.as_ref(), "remove");
        self.calls.lock().push(OsCall::Remove(path.to_path_buf()));
        if self.fail_remove {
            return Err(injected("remove"));
        }
        Ok(())
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        record(self.log.as_ref(), "remove_all");
        self.calls.lock().push(OsCall::RemoveAll(path.to_path_buf()));
        if self.fail_remove_all {
            return Err(injected("remove_all"));
        }
        Ok(())
    }

    /// The gid of the most recent `mkdir_all_with_owner`, if any.
    fn owner_gid(&self, path: &Path) -> io::Result<u32> {
        record(self.log.as_ref(), "owner_gid");
        let mut calls = self.calls.lock();
        calls.push(OsCall::OwnerGid(path.to_path_buf()));
        calls
            .iter()
            .rev()
            .find_map(|call| match call {
                OsCall::MkdirAll { gid, .. } => Some(*gid),
                _ => None,
            })
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
}

/// Fakes wired into [`Collaborators`](crate::provisioner::Collaborators).
pub struct Harness {
    pub cloud: Arc<FakeCloud>,
    pub factory: Option<Arc<FakeCloudFactory>>,
    pub mounter: Arc<RecordingMounter>,
    pub os: Arc<FakeOsClient>,
    pub allocator: Arc<crate::identity::GidAllocator>,
    pub log: EventLog,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(RecordingMounter::default(), FakeOsClient::default())
    }

    /// Build from pre-configured host fakes; both get the shared event log.
    pub fn with(mounter: RecordingMounter, os: FakeOsClient) -> Self {
        let log = EventLog::default();
        Self {
            cloud: Arc::new(FakeCloud::default()),
            factory: None,
            mounter: Arc::new(mounter.with_log(Arc::clone(&log))),
            os: Arc::new(os.with_log(Arc::clone(&log))),
            allocator: Arc::new(crate::identity::GidAllocator::new()),
            log,
        }
    }

    /// Allow role secrets, routed back to the same fake cloud.
    #[must_use]
    pub fn with_role_factory(mut self) -> Self {
        let cloud: Arc<dyn Cloud> = self.cloud.clone();
        self.factory = Some(Arc::new(FakeCloudFactory::new(cloud)));
        self
    }

    pub fn collaborators(&self) -> crate::provisioner::Collaborators {
        let cloud: Arc<dyn Cloud> = self.cloud.clone();
        let mut router = crate::cloud::CloudRouter::new(cloud);
        if let Some(factory) = &self.factory {
            router = router.with_factory(factory.clone());
        }
        crate::provisioner::Collaborators {
            router,
            allocator: Arc::clone(&self.allocator),
            mounter: self.mounter.clone(),
            os: self.os.clone(),
            temp_mount_root: PathBuf::from("/var/lib/csi/pv"),
        }
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.log.lock().clone()
    }
}

/// A parameter map from literal pairs.
pub fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}
