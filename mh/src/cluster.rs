//! Cluster map snapshots
//!
//! An `OsdMap` is an immutable snapshot handed out by the host. Changes are
//! expressed as an `Incremental` that produces the next epoch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::error::HostError;

/// A single OSD entry in the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsdInfo {
    pub osd: i32,
    pub up: bool,
    #[serde(rename = "in")]
    pub in_: bool,
    pub weight: f64,
}

/// A storage device leaf in the crush tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrushDevice {
    pub id: i32,
    pub name: String,
    pub weight: f64,
}

/// An interior crush node; bucket ids are negative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrushBucket {
    pub id: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub bucket_type: String,
    pub items: Vec<i32>,
}

/// A placement rule and the bucket it starts from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrushRule {
    pub id: u32,
    pub name: String,
    pub take: i32,
}

/// Crush hierarchy of a cluster map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrushMap {
    pub devices: Vec<CrushDevice>,
    pub buckets: Vec<CrushBucket>,
    pub rules: Vec<CrushRule>,
}

impl CrushMap {
    pub fn dump(&self) -> Value {
        json!({
            "devices": self.devices,
            "buckets": self.buckets,
            "rules": self.rules,
        })
    }

    fn bucket(&self, id: i32) -> Option<&CrushBucket> {
        self.buckets.iter().find(|b| b.id == id)
    }

    fn device(&self, id: i32) -> Option<&CrushDevice> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn item_name(&self, id: i32) -> Option<&str> {
        if id < 0 {
            self.bucket(id).map(|b| b.name.as_str())
        } else {
            self.device(id).map(|d| d.name.as_str())
        }
    }

    /// Weight of an item; a bucket weighs the sum of everything below it
    pub fn item_weight(&self, id: i32) -> Option<f64> {
        if id < 0 {
            let bucket = self.bucket(id)?;
            Some(bucket.items.iter().filter_map(|&item| self.item_weight(item)).sum())
        } else {
            self.device(id).map(|d| d.weight)
        }
    }

    /// Distinct buckets that rules take from
    pub fn find_takes(&self) -> Vec<i32> {
        let mut takes: Vec<i32> = self.rules.iter().map(|r| r.take).collect();
        takes.sort_unstable();
        takes.dedup();
        takes
    }

    /// Normalized weight of every device reachable from `root`
    ///
    /// Weights sum to 1.0; an unknown root or a weightless subtree yields an empty map.
    pub fn take_weight_osd_map(&self, root: i32) -> BTreeMap<i32, f64> {
        let mut weights = BTreeMap::new();
        self.collect_devices(root, &mut weights);

        let total: f64 = weights.values().sum();
        if total <= 0.0 {
            return BTreeMap::new();
        }
        weights.values_mut().for_each(|w| *w /= total);
        weights
    }

    fn collect_devices(&self, id: i32, out: &mut BTreeMap<i32, f64>) {
        if id >= 0 {
            if let Some(device) = self.device(id) {
                out.insert(device.id, device.weight);
            }
            return;
        }
        if let Some(bucket) = self.bucket(id) {
            for &item in &bucket.items {
                self.collect_devices(item, out);
            }
        }
    }

    /// Plain-text rendering of the hierarchy
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for device in &self.devices {
            text.push_str(&format!("device {} {}\n", device.id, device.name));
        }
        for bucket in &self.buckets {
            text.push_str(&format!("{} {} {{\n\tid {}\n", bucket.bucket_type, bucket.name, bucket.id));
            for &item in &bucket.items {
                let name = self.item_name(item).unwrap_or("?");
                let weight = self.item_weight(item).unwrap_or(0.0);
                text.push_str(&format!("\titem {} weight {:.3}\n", name, weight));
            }
            text.push_str("}\n");
        }
        for rule in &self.rules {
            let take = self.item_name(rule.take).unwrap_or("?");
            text.push_str(&format!("rule {} {{\n\tid {}\n\tstep take {}\n}}\n", rule.name, rule.id, take));
        }
        text
    }
}

/// Pending change to an `OsdMap`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incremental {
    pub epoch: u32,
    #[serde(rename = "new-weights")]
    pub new_weights: BTreeMap<i32, f64>,
}

impl Incremental {
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn dump(&self) -> Value {
        json!({
            "epoch": self.epoch,
            "new_weight": self
                .new_weights
                .iter()
                .map(|(osd, weight)| json!({"osd": osd, "weight": weight}))
                .collect::<Vec<_>>(),
        })
    }

    pub fn set_osd_reweights(&mut self, weights: impl IntoIterator<Item = (i32, f64)>) {
        self.new_weights.extend(weights);
    }
}

/// Snapshot of the OSD map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsdMap {
    pub epoch: u32,
    #[serde(rename = "crush-version")]
    pub crush_version: u32,
    pub osds: Vec<OsdInfo>,
    pub crush: CrushMap,
}

impl OsdMap {
    /// Build a map with `osd_count` OSDs spread round-robin over `hosts`
    pub fn simulated(osd_count: u32, hosts: &[String]) -> Self {
        let hosts: Vec<String> = if hosts.is_empty() {
            vec!["localhost".to_string()]
        } else {
            hosts.to_vec()
        };

        let osds = (0..osd_count as i32)
            .map(|osd| OsdInfo {
                osd,
                up: true,
                in_: true,
                weight: 1.0,
            })
            .collect();

        let devices = (0..osd_count as i32)
            .map(|id| CrushDevice {
                id,
                name: format!("osd.{}", id),
                weight: 1.0,
            })
            .collect();

        let mut host_buckets: Vec<CrushBucket> = hosts
            .iter()
            .enumerate()
            .map(|(i, host)| CrushBucket {
                id: -2 - i as i32,
                name: host.clone(),
                bucket_type: "host".to_string(),
                items: Vec::new(),
            })
            .collect();
        for osd in 0..osd_count as usize {
            host_buckets[osd % hosts.len()].items.push(osd as i32);
        }

        let root = CrushBucket {
            id: -1,
            name: "default".to_string(),
            bucket_type: "root".to_string(),
            items: host_buckets.iter().map(|b| b.id).collect(),
        };

        let mut buckets = vec![root];
        buckets.extend(host_buckets);

        Self {
            epoch: 1,
            crush_version: 1,
            osds,
            crush: CrushMap {
                devices,
                buckets,
                rules: vec![CrushRule {
                    id: 0,
                    name: "replicated_rule".to_string(),
                    take: -1,
                }],
            },
        }
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn crush_version(&self) -> u32 {
        self.crush_version
    }

    pub fn osds(&self) -> &[OsdInfo] {
        &self.osds
    }

    pub fn crush(&self) -> &CrushMap {
        &self.crush
    }

    pub fn dump(&self) -> Value {
        json!({
            "epoch": self.epoch,
            "crush_version": self.crush_version,
            "osds": self.osds,
        })
    }

    /// Host bucket holding the given OSD
    pub fn host_of(&self, osd: i32) -> Option<&str> {
        self.crush
            .buckets
            .iter()
            .find(|b| b.bucket_type == "host" && b.items.contains(&osd))
            .map(|b| b.name.as_str())
    }

    /// Start an incremental for the next epoch
    pub fn new_incremental(&self) -> Incremental {
        Incremental {
            epoch: self.epoch + 1,
            new_weights: BTreeMap::new(),
        }
    }

    /// Produce the map that results from applying `inc`
    pub fn apply_incremental(&self, inc: &Incremental) -> Result<OsdMap, HostError> {
        if inc.epoch != self.epoch + 1 {
            return Err(HostError::Invalid(format!(
                "Incremental epoch {} does not follow map epoch {}",
                inc.epoch, self.epoch
            )));
        }

        let mut next = self.clone();
        next.epoch = inc.epoch;
        for (&osd, &weight) in &inc.new_weights {
            if !next.set_weight(osd, weight) {
                return Err(HostError::NotFound(format!("osd.{}", osd)));
            }
        }
        Ok(next)
    }

    /// Set an OSD's reweight value; false if the OSD does not exist
    pub fn set_weight(&mut self, osd: i32, weight: f64) -> bool {
        match self.osds.iter_mut().find(|o| o.osd == osd) {
            Some(info) => {
                info.weight = weight;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts() -> Vec<String> {
        vec!["node-a".to_string(), "node-b".to_string()]
    }

    #[test]
    fn test_simulated_layout() {
        let map = OsdMap::simulated(3, &hosts());
        assert_eq!(map.osds().len(), 3);
        assert_eq!(map.host_of(0), Some("node-a"));
        assert_eq!(map.host_of(1), Some("node-b"));
        assert_eq!(map.host_of(2), Some("node-a"));
        assert_eq!(map.crush().item_name(-1), Some("default"));
        assert_eq!(map.crush().item_name(2), Some("osd.2"));
    }

    #[test]
    fn test_item_weight_sums_subtree() {
        let map = OsdMap::simulated(4, &hosts());
        assert_eq!(map.crush().item_weight(-1), Some(4.0));
        assert_eq!(map.crush().item_weight(-2), Some(2.0));
        assert_eq!(map.crush().item_weight(-99), None);
    }

    #[test]
    fn test_take_weight_osd_map_is_normalized() {
        let map = OsdMap::simulated(4, &hosts());
        let weights = map.crush().take_weight_osd_map(-1);
        assert_eq!(weights.len(), 4);
        let total: f64 = weights.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(map.crush().take_weight_osd_map(-42).is_empty());
    }

    #[test]
    fn test_find_takes() {
        let map = OsdMap::simulated(2, &hosts());
        assert_eq!(map.crush().find_takes(), vec![-1]);
    }

    #[test]
    fn test_apply_incremental() {
        let map = OsdMap::simulated(3, &hosts());
        let mut inc = map.new_incremental();
        assert_eq!(inc.epoch(), 2);
        inc.set_osd_reweights([(1, 0.5)]);

        let next = map.apply_incremental(&inc).unwrap();
        assert_eq!(next.epoch(), 2);
        assert_eq!(next.osds()[1].weight, 0.5);
        // the original snapshot is untouched
        assert_eq!(map.osds()[1].weight, 1.0);
    }

    #[test]
    fn test_apply_incremental_rejects_stale_epoch() {
        let map = OsdMap::simulated(1, &hosts());
        let inc = Incremental {
            epoch: 7,
            new_weights: BTreeMap::new(),
        };
        assert!(matches!(map.apply_incremental(&inc), Err(HostError::Invalid(_))));
    }

    #[test]
    fn test_dump_uses_in_key() {
        let map = OsdMap::simulated(1, &hosts());
        let dump = map.dump();
        assert_eq!(dump["osds"][0]["in"], Value::Bool(true));
        assert_eq!(dump["epoch"], 1);
    }

    #[test]
    fn test_crush_text_mentions_every_bucket() {
        let map = OsdMap::simulated(2, &hosts());
        let text = map.crush().to_text();
        assert!(text.contains("root default"));
        assert!(text.contains("host node-a"));
        assert!(text.contains("step take default"));
    }
}
