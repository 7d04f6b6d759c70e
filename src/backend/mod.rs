pub mod rpc;
pub mod xo;

use crate::error::RotateError;
use crate::model::{Identity, Inventory};

use rpc::RpcError;

/// What rotation needs from a control plane, once signed in.
#[allow(async_fn_in_trait)] // trait is internal-only; rotations run on one task
pub trait ControlPlane {
    /// One full read of VMs and snapshots, already normalized.
    async fn fetch_inventory(&self) -> Result<Inventory, RotateError>;

    /// Snapshot `vm` under `name`, returning the new snapshot's identity.
    async fn create_snapshot(&self, vm: &Identity, name: &str) -> Result<Identity, RpcError>;

    async fn delete_snapshot(&self, snapshot: &Identity, delete_disks: bool)
    -> Result<(), RpcError>;
}
