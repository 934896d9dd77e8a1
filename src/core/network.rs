/*!
 * Copyright (c) 2016 Microsoft Corporation. All rights reserved.
 * Licensed under the MIT License. See LICENSE file in the project root for license information.
 */

//! Distributed communication collaborator.
//!
//! The parallel tree learners only ever need one primitive: an allreduce
//! over fixed-size byte buffers with a caller-supplied reducer. The
//! transport itself (sockets, MPI, ...) is external; this module defines
//! the interface, the single-machine loopback implementation used by
//! default, and the generic reducers.

use crate::core::error::{BoostError, Result};

/// Reducer signature: folds `src` into `dst`, both the same length.
pub type ReduceFunction = dyn Fn(&[u8], &mut [u8]) + Sync;

/// Transport interface supplied by the embedding application for
/// multi-machine training. Any node failure is expected to surface as an
/// error that aborts the whole job; no partial-failure recovery happens
/// above this interface.
pub trait AllreduceTransport: Send + Sync {
    /// Rank of the local machine in `[0, num_machines)`.
    fn rank(&self) -> i32;
    /// Total number of machines.
    fn num_machines(&self) -> i32;
    /// Reduces `send` across all machines into `recv` on every machine.
    fn allreduce(&self, send: &[u8], recv: &mut [u8], reducer: &ReduceFunction) -> Result<()>;
}

/// Single-machine transport: allreduce is a copy.
#[derive(Debug, Default)]
pub struct LoopbackTransport;

impl AllreduceTransport for LoopbackTransport {
    fn rank(&self) -> i32 {
        0
    }

    fn num_machines(&self) -> i32 {
        1
    }

    fn allreduce(&self, send: &[u8], recv: &mut [u8], _reducer: &ReduceFunction) -> Result<()> {
        recv.copy_from_slice(send);
        Ok(())
    }
}

/// Front-end the learners talk to. Validates buffer sizes before handing
/// them to the transport.
pub struct Network {
    transport: Box<dyn AllreduceTransport>,
}

impl Network {
    /// Single-machine network with the loopback transport.
    pub fn single_machine() -> Self {
        Network {
            transport: Box::new(LoopbackTransport),
        }
    }

    /// Network over a user-supplied transport.
    pub fn with_transport(transport: Box<dyn AllreduceTransport>) -> Self {
        Network { transport }
    }

    pub fn rank(&self) -> i32 {
        self.transport.rank()
    }

    pub fn num_machines(&self) -> i32 {
        self.transport.num_machines()
    }

    /// Allreduce with size checking; a mismatch is fatal for the job.
    pub fn allreduce(&self, send: &[u8], recv: &mut [u8], reducer: &ReduceFunction) -> Result<()> {
        if send.len() != recv.len() {
            return Err(BoostError::network(format!(
                "allreduce buffer size mismatch: send {} bytes, recv {} bytes",
                send.len(),
                recv.len()
            )));
        }
        self.transport.allreduce(send, recv, reducer)
    }

    /// Agrees on the minimum of an i32 across machines. Used to sync the
    /// data random seed before parallel bin construction.
    pub fn global_sync_up_by_min(&self, local: i32) -> Result<i32> {
        let send = local.to_le_bytes();
        let mut recv = [0u8; 4];
        self.allreduce(&send, &mut recv, &reduce_min_i32)?;
        Ok(i32::from_le_bytes(recv))
    }
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("rank", &self.rank())
            .field("num_machines", &self.num_machines())
            .finish()
    }
}

/// Element-wise minimum over i32 buffers.
pub fn reduce_min_i32(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
        let sv = i32::from_le_bytes([s[0], s[1], s[2], s[3]]);
        let dv = i32::from_le_bytes([d[0], d[1], d[2], d[3]]);
        if sv < dv {
            d.copy_from_slice(s);
        }
    }
}

/// Element-wise sum over f64 buffers.
pub fn reduce_sum_f64(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(8).zip(dst.chunks_exact_mut(8)) {
        let sv = f64::from_le_bytes([s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7]]);
        let dv = f64::from_le_bytes([d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]]);
        d.copy_from_slice(&(sv + dv).to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_copies() {
        let net = Network::single_machine();
        let send = [1u8, 2, 3, 4];
        let mut recv = [0u8; 4];
        net.allreduce(&send, &mut recv, &reduce_min_i32).unwrap();
        assert_eq!(send, recv);
        assert_eq!(net.global_sync_up_by_min(17).unwrap(), 17);
    }

    #[test]
    fn size_mismatch_is_fatal() {
        let net = Network::single_machine();
        let mut recv = [0u8; 2];
        assert!(net.allreduce(&[0u8; 4], &mut recv, &reduce_min_i32).is_err());
    }

    #[test]
    fn reducers_fold_elementwise() {
        let a: Vec<u8> = [1.0f64, -2.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut b: Vec<u8> = [0.5f64, 4.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        reduce_sum_f64(&a, &mut b);
        let out: Vec<f64> = b
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(out, vec![1.5, 2.0]);
    }
}
