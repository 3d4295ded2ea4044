//! Snapshot wire format and the two-phase state codec.
//!
//! A snapshot is `{ version, stages: [{ type, params, state }, …] }`.
//! `loadState` validates the whole snapshot — version, stage count, per-stage
//! type and parameter compatibility, and per-stage state invariants — before
//! committing any of it, so a rejected snapshot never partially mutates the
//! pipeline.

use crate::errors::StateError;
use crate::registry::{LoadedState, Stage};
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CURRENT_VERSION: i64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSnapshot {
    #[serde(rename = "type")]
    pub stage_type: String,
    pub params: Value,
    pub state: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: i64,
    pub stages: Vec<StageSnapshot>,
}

/// Collects every stage's `{type, params, state}` in append order. Never
/// fails — there is nothing to validate when writing.
pub fn save_state_raw(stages: &[Stage]) -> Snapshot {
    Snapshot {
        version: CURRENT_VERSION,
        stages: stages
            .iter()
            .map(|stage| StageSnapshot {
                stage_type: stage.tag().to_string(),
                params: stage.params_value(),
                state: stage.save_state(),
            })
            .collect(),
    }
}

/// Phase 1: structural validation (version, stage count, per-stage type and
/// parameter match) plus per-stage state validation, with nothing committed
/// yet. Returns the parsed, ready-to-apply state for every stage.
pub fn validate_snapshot(stages: &[Stage], snapshot: &Snapshot) -> Result<Vec<LoadedState>> {
    if snapshot.version != CURRENT_VERSION {
        bail!(StateError::UnsupportedVersion(snapshot.version));
    }
    if snapshot.stages.len() != stages.len() {
        bail!(StateError::StageCountMismatch {
            snapshot: snapshot.stages.len(),
            pipeline: stages.len(),
        });
    }

    let mut loaded = Vec::with_capacity(stages.len());
    for (index, (stage, stage_snapshot)) in stages.iter().zip(snapshot.stages.iter()).enumerate() {
        if stage_snapshot.stage_type != stage.tag() {
            bail!(StateError::StageTypeMismatch {
                index,
                snapshot_type: stage_snapshot.stage_type.clone(),
                pipeline_type: stage.tag().to_string(),
            });
        }
        if stage_snapshot.params != stage.params_value() {
            bail!(StateError::StageParamsMismatch {
                index,
                tag: stage.tag(),
            });
        }
        loaded.push(stage.validate_load(&stage_snapshot.state)?);
    }

    Ok(loaded)
}

/// Phase 2: commit. Only called after [`validate_snapshot`] succeeds for
/// every stage, so this step cannot fail.
pub fn apply_snapshot(stages: &mut [Stage], loaded: Vec<LoadedState>) -> Result<()> {
    for (stage, state) in stages.iter_mut().zip(loaded.into_iter()) {
        stage.apply_load(state)?;
    }
    Ok(())
}

/// Validates then commits in one call — the common case. Exposed separately
/// from the two phases above so the resilience wrapper can retry phase 1
/// without risking a partial phase-2 commit.
pub fn try_load_state(stages: &mut [Stage], snapshot: &Snapshot) -> Result<()> {
    let loaded = validate_snapshot(stages, snapshot)?;
    apply_snapshot(stages, loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::integrator::IntegratorStage;
    use crate::kernels::rectify::{RectifyMode, RectifyStage};

    fn sample_stages() -> Vec<Stage> {
        vec![
            Stage::Rectify(RectifyStage::new(RectifyMode::Full)),
            Stage::Integrator(IntegratorStage::new(0.9).unwrap()),
        ]
    }

    #[test]
    fn save_then_load_round_trips_state() {
        let mut stages = sample_stages();
        if let Stage::Integrator(s) = &mut stages[1] {
            s.process(&mut [vec![1.0, 1.0, 1.0]]);
        }

        let snapshot = save_state_raw(&stages);

        let mut fresh = sample_stages();
        try_load_state(&mut fresh, &snapshot).unwrap();

        assert_eq!(
            serde_json::to_value(fresh[1].save_state()).unwrap(),
            serde_json::to_value(stages[1].save_state()).unwrap()
        );
    }

    #[test]
    fn rejects_unsupported_version() {
        let stages = sample_stages();
        let mut snapshot = save_state_raw(&stages);
        snapshot.version = 2;
        let mut target = sample_stages();
        assert!(try_load_state(&mut target, &snapshot).is_err());
    }

    #[test]
    fn rejects_stage_count_mismatch() {
        let stages = sample_stages();
        let snapshot = save_state_raw(&stages);
        let mut target = vec![Stage::Rectify(RectifyStage::new(RectifyMode::Full))];
        assert!(try_load_state(&mut target, &snapshot).is_err());
    }

    #[test]
    fn rejects_mismatched_stage_type() {
        let stages = sample_stages();
        let snapshot = save_state_raw(&stages);
        let mut target = vec![
            Stage::Rectify(RectifyStage::new(RectifyMode::Full)),
            Stage::Rectify(RectifyStage::new(RectifyMode::Full)),
        ];
        assert!(try_load_state(&mut target, &snapshot).is_err());
    }

    #[test]
    fn rejects_corrupted_running_sum() {
        use crate::kernels::zscore::ZScoreStage;

        let mut stages = vec![Stage::ZScoreNormalize(ZScoreStage::moving(3).unwrap())];
        if let Stage::ZScoreNormalize(s) = &mut stages[0] {
            s.process(&mut [vec![1.0, 2.0, 3.0]]);
        }
        let mut snapshot = save_state_raw(&stages);

        if let Some(channel) = snapshot.stages[0].state["channels"].get_mut(0) {
            channel["runningSum"] = serde_json::json!(999.0);
        }

        let mut target = vec![Stage::ZScoreNormalize(ZScoreStage::moving(3).unwrap())];
        assert!(try_load_state(&mut target, &snapshot).is_err());
    }
}
