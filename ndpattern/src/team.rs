/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Teams of processing units and their arrangement into grids.
//!
//! The runtime that actually launches units and moves bytes between
//! them is outside this crate. It is consumed through the [`Team`]
//! trait, which exposes only what patterns need: the team size, the
//! calling unit's rank, a barrier, a byte broadcast and a topology
//! hint. [`StaticTeam`] and [`ThreadTeam`] are two in-process
//! implementations.

use std::fmt;
use std::sync::Arc;
use std::sync::Barrier;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cartesian::CartesianIndexSpace;
use crate::distribution::DistributionSpec;
use crate::error::PatternError;

/// Hardware topology of the machine(s) a team runs on.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct Locality {
    pub num_nodes: usize,
    pub num_numa_domains: usize,
    pub num_cpus: usize,
}

impl Default for Locality {
    fn default() -> Self {
        Self {
            num_nodes: 1,
            num_numa_domains: 1,
            num_cpus: 1,
        }
    }
}

/// The capabilities a pattern needs from the runtime's notion of a
/// team of units.
pub trait Team: Send + Sync {
    /// Number of units in the team.
    fn size(&self) -> usize;

    /// Rank of the calling unit, in `0..size()`.
    fn myid(&self) -> usize;

    /// Block until every unit of the team has called `barrier`.
    fn barrier(&self) -> Result<(), PatternError>;

    /// Replace `buf` on every unit with the contents of `buf` on unit
    /// `root`. Collective: all units must call it.
    fn broadcast_bytes(&self, buf: &mut Vec<u8>, root: usize) -> Result<(), PatternError>;

    /// Topology hint used when arranging units.
    fn locality(&self) -> Locality {
        Locality::default()
    }
}

/// Broadcast a serializable value from `root` to all units of `team`.
pub fn broadcast<T>(team: &dyn Team, value: &T, root: usize) -> Result<T, PatternError>
where
    T: Serialize + DeserializeOwned,
{
    if root >= team.size() {
        return Err(PatternError::UnitOutOfRange {
            unit: root,
            nunits: team.size(),
        });
    }
    // Every unit encodes its own value; the root's copy wins.
    let mut buf = bincode::serialize(value)?;
    team.broadcast_bytes(&mut buf, root)?;
    Ok(bincode::deserialize(&buf)?)
}

/// A team whose size and rank are fixed, with no peers to talk to.
/// Collectives complete immediately; a broadcast leaves the buffer as
/// it is. Useful when every unit computes the same pattern from the
/// same inputs, and for asking what a pattern looks like from another
/// unit's point of view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticTeam {
    size: usize,
    myid: usize,
    locality: Locality,
}

impl StaticTeam {
    pub fn new(size: usize, myid: usize) -> Result<Self, PatternError> {
        if size == 0 {
            return Err(PatternError::invalid("team must have at least one unit"));
        }
        if myid >= size {
            return Err(PatternError::UnitOutOfRange {
                unit: myid,
                nunits: size,
            });
        }
        Ok(Self {
            size,
            myid,
            locality: Locality::default(),
        })
    }

    pub fn with_locality(mut self, locality: Locality) -> Self {
        self.locality = locality;
        self
    }
}

impl Team for StaticTeam {
    fn size(&self) -> usize {
        self.size
    }

    fn myid(&self) -> usize {
        self.myid
    }

    fn barrier(&self) -> Result<(), PatternError> {
        Ok(())
    }

    fn broadcast_bytes(&self, _buf: &mut Vec<u8>, root: usize) -> Result<(), PatternError> {
        if root >= self.size {
            return Err(PatternError::UnitOutOfRange {
                unit: root,
                nunits: self.size,
            });
        }
        Ok(())
    }

    fn locality(&self) -> Locality {
        self.locality
    }
}

struct Shared {
    barrier: Barrier,
    slot: Mutex<Vec<u8>>,
}

/// A team of units running as threads of one process. Create the
/// whole group with [`ThreadTeam::group`] and move one member into
/// each thread.
#[derive(Clone)]
pub struct ThreadTeam {
    shared: Arc<Shared>,
    size: usize,
    myid: usize,
}

impl ThreadTeam {
    pub fn group(size: usize) -> Vec<ThreadTeam> {
        let shared = Arc::new(Shared {
            barrier: Barrier::new(size),
            slot: Mutex::new(Vec::new()),
        });
        (0..size)
            .map(|myid| ThreadTeam {
                shared: shared.clone(),
                size,
                myid,
            })
            .collect()
    }
}

impl fmt::Debug for ThreadTeam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadTeam")
            .field("size", &self.size)
            .field("myid", &self.myid)
            .finish()
    }
}

impl Team for ThreadTeam {
    fn size(&self) -> usize {
        self.size
    }

    fn myid(&self) -> usize {
        self.myid
    }

    fn barrier(&self) -> Result<(), PatternError> {
        self.shared.barrier.wait();
        Ok(())
    }

    fn broadcast_bytes(&self, buf: &mut Vec<u8>, root: usize) -> Result<(), PatternError> {
        if root >= self.size {
            return Err(PatternError::UnitOutOfRange {
                unit: root,
                nunits: self.size,
            });
        }
        // Every unit must reach both barriers, even on a poisoned slot.
        let written = if self.myid == root {
            self.shared
                .slot
                .lock()
                .map(|mut slot| slot.clone_from(buf))
                .map_err(|e| PatternError::Team(e.to_string()))
        } else {
            Ok(())
        };
        self.shared.barrier.wait();
        let read = if self.myid != root {
            self.shared
                .slot
                .lock()
                .map(|slot| buf.clone_from(&slot))
                .map_err(|e| PatternError::Team(e.to_string()))
        } else {
            Ok(())
        };
        // Keep the root from overwriting the slot before everyone has read it.
        self.shared.barrier.wait();
        written.and(read)
    }
}

/// Arrangement of a team's units in an n-dimensional grid. Units are
/// numbered in row-major order over the grid.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash, Debug)]
pub struct TeamSpec {
    space: CartesianIndexSpace,
}

impl TeamSpec {
    /// Arrange the units of `team` in a grid of the given extents. The
    /// extents must multiply to the team size.
    pub fn new(extents: impl Into<Vec<usize>>, team: &dyn Team) -> Result<Self, PatternError> {
        Self::with_size(extents, team.size())
    }

    pub(crate) fn with_size(
        extents: impl Into<Vec<usize>>,
        nunits: usize,
    ) -> Result<Self, PatternError> {
        let extents = extents.into();
        if extents.is_empty() {
            return Err(PatternError::invalid("team spec needs at least one dimension"));
        }
        let got: usize = extents.iter().product();
        if got != nunits {
            return Err(PatternError::TeamSizeMismatch {
                expected: nunits,
                got,
            });
        }
        Ok(Self {
            space: CartesianIndexSpace::row_major(extents),
        })
    }

    /// All units along the first dimension.
    pub fn default_for(ndim: usize, team: &dyn Team) -> Self {
        let mut extents = vec![1; ndim.max(1)];
        extents[0] = team.size();
        Self {
            space: CartesianIndexSpace::row_major(extents),
        }
    }

    /// All units along the first distributed dimension of `distspec`.
    pub fn from_distribution(distspec: &DistributionSpec, team: &dyn Team) -> Self {
        let mut extents = vec![1; distspec.ndim()];
        let dim = distspec
            .iter()
            .position(|d| d.is_distributed())
            .unwrap_or(0);
        extents[dim] = team.size();
        Self {
            space: CartesianIndexSpace::row_major(extents),
        }
    }

    /// Rearrange the same units into a grid of new extents.
    pub fn resize(&mut self, extents: impl Into<Vec<usize>>) -> Result<(), PatternError> {
        *self = Self::with_size(extents, self.size())?;
        Ok(())
    }

    pub fn ndim(&self) -> usize {
        self.space.ndim()
    }

    /// Total number of units.
    pub fn size(&self) -> usize {
        self.space.size()
    }

    pub fn extents(&self) -> &[usize] {
        self.space.extents()
    }

    /// Number of units along dimension `dim`.
    pub fn extent(&self, dim: usize) -> Result<usize, PatternError> {
        self.space.extent(dim)
    }

    /// Number of dimensions with more than one unit.
    pub fn rank(&self) -> usize {
        self.extents().iter().filter(|&&e| e > 1).count()
    }

    /// Grid coordinates of `unit`.
    pub fn coords(&self, unit: usize) -> Result<Vec<usize>, PatternError> {
        if unit >= self.size() {
            return Err(PatternError::UnitOutOfRange {
                unit,
                nunits: self.size(),
            });
        }
        Ok(self.space.delinearize(unit))
    }

    /// Unit at grid coordinates `coords`.
    pub fn at(&self, coords: &[usize]) -> Result<usize, PatternError> {
        self.space.at(coords)
    }

    pub(crate) fn space(&self) -> &CartesianIndexSpace {
        &self.space
    }
}

impl fmt::Display for TeamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TeamSpec({:?})", self.extents())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::distribution::Distribution;

    #[test]
    fn test_static_team() {
        let team = StaticTeam::new(4, 2).unwrap();
        assert_eq!(team.size(), 4);
        assert_eq!(team.myid(), 2);
        assert!(team.barrier().is_ok());
        assert!(matches!(
            StaticTeam::new(4, 4),
            Err(PatternError::UnitOutOfRange { unit: 4, nunits: 4 })
        ));
        assert!(StaticTeam::new(0, 0).is_err());
    }

    #[test]
    fn test_team_spec() {
        let team = StaticTeam::new(12, 0).unwrap();
        let spec = TeamSpec::new(vec![3, 4], &team).unwrap();
        assert_eq!(spec.size(), 12);
        assert_eq!(spec.rank(), 2);
        assert_eq!(spec.coords(7).unwrap(), vec![1, 3]);
        assert_eq!(spec.at(&[1, 3]).unwrap(), 7);
        assert!(spec.coords(12).is_err());

        assert!(matches!(
            TeamSpec::new(vec![3, 3], &team),
            Err(PatternError::TeamSizeMismatch {
                expected: 12,
                got: 9
            })
        ));
    }

    #[test]
    fn test_team_spec_default_and_resize() {
        let team = StaticTeam::new(6, 0).unwrap();
        let mut spec = TeamSpec::default_for(3, &team);
        assert_eq!(spec.extents(), &[6, 1, 1]);
        assert_eq!(spec.rank(), 1);
        spec.resize(vec![1, 2, 3]).unwrap();
        assert_eq!(spec.extents(), &[1, 2, 3]);
        assert!(spec.resize(vec![4, 1, 1]).is_err());
    }

    #[test]
    fn test_team_spec_from_distribution() {
        let team = StaticTeam::new(4, 0).unwrap();
        let dist = DistributionSpec::new(vec![Distribution::None, Distribution::Cyclic]).unwrap();
        let spec = TeamSpec::from_distribution(&dist, &team);
        assert_eq!(spec.extents(), &[1, 4]);
    }

    #[test]
    fn test_thread_team_broadcast() {
        let handles: Vec<_> = ThreadTeam::group(4)
            .into_iter()
            .map(|team| {
                thread::spawn(move || {
                    let value = vec![team.myid() as u64; 3];
                    let got = broadcast(&team, &value, 2).unwrap();
                    team.barrier().unwrap();
                    got
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), vec![2u64, 2, 2]);
        }
    }

    #[test]
    fn test_thread_team_broadcast_poisoned_slot() {
        let group = ThreadTeam::group(3);
        let shared = group[0].shared.clone();
        let _ = thread::spawn(move || {
            let _guard = shared.slot.lock().unwrap();
            panic!("poison the slot");
        })
        .join();

        let handles: Vec<_> = group
            .into_iter()
            .map(|team| thread::spawn(move || broadcast(&team, &7u32, 1)))
            .collect();
        for handle in handles {
            assert!(matches!(handle.join().unwrap(), Err(PatternError::Team(_))));
        }
    }

    #[test]
    fn test_broadcast_bad_root() {
        let team = StaticTeam::new(2, 0).unwrap();
        assert!(matches!(
            broadcast(&team, &1u32, 2),
            Err(PatternError::UnitOutOfRange { unit: 2, nunits: 2 })
        ));
    }
}
