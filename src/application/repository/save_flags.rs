use crate::domain::events::{ExpectedVersion, OpenMode};

/// 保存モード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// 新しいストリームとして保存する（期待バージョン 0）
    Create,
    /// 既存ストリームに追記する
    ///
    /// `expected` が `Some` なら楽観的同時実行制御、`None` なら無条件に追記。
    Append { expected: Option<u64> },
}

impl SaveMode {
    pub fn open_mode(&self) -> OpenMode {
        match self {
            SaveMode::Create => OpenMode::Create,
            SaveMode::Append { .. } => OpenMode::Open,
        }
    }

    pub fn expected_version(&self) -> ExpectedVersion {
        match self {
            SaveMode::Create => ExpectedVersion::NoStream,
            SaveMode::Append {
                expected: Some(version),
            } => ExpectedVersion::exact(*version),
            SaveMode::Append { expected: None } => ExpectedVersion::Any,
        }
    }
}

/// スナップショット方針
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotPolicy {
    #[default]
    Never,
    /// 保存のたびに作成する
    Always,
    /// 現在のバージョンが前回のスナップショットから n 以上進んだら作成する
    Every(u64),
}

impl SnapshotPolicy {
    /// 閾値から方針を決める
    ///
    /// 0 以下 → Never、1 → Always、n > 1 → Every(n)
    pub fn from_threshold(threshold: i64) -> Self {
        match threshold {
            t if t <= 0 => SnapshotPolicy::Never,
            1 => SnapshotPolicy::Always,
            n => SnapshotPolicy::Every(n as u64),
        }
    }

    /// 新しい現在バージョンと前回のスナップショットバージョンから、作成すべきか判定する
    pub fn is_due(&self, current_version: u64, snapshot_version: u64) -> bool {
        match self {
            SnapshotPolicy::Never => false,
            SnapshotPolicy::Always => true,
            SnapshotPolicy::Every(n) => current_version >= snapshot_version.saturating_add(*n),
        }
    }
}

/// 保存フラグ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveFlags {
    pub mode: SaveMode,
    pub snapshot: SnapshotPolicy,
}

impl SaveFlags {
    pub fn create() -> Self {
        Self {
            mode: SaveMode::Create,
            snapshot: SnapshotPolicy::Never,
        }
    }

    /// 無条件に追記する
    pub fn append() -> Self {
        Self {
            mode: SaveMode::Append { expected: None },
            snapshot: SnapshotPolicy::Never,
        }
    }

    /// ストリームのバージョンが `version` であることを条件に追記する
    pub fn append_expecting(version: u64) -> Self {
        Self {
            mode: SaveMode::Append {
                expected: Some(version),
            },
            snapshot: SnapshotPolicy::Never,
        }
    }

    pub fn with_snapshots(mut self, policy: SnapshotPolicy) -> Self {
        self.snapshot = policy;
        self
    }

    pub fn with_snapshot_threshold(self, threshold: i64) -> Self {
        self.with_snapshots(SnapshotPolicy::from_threshold(threshold))
    }
}

impl Default for SaveFlags {
    fn default() -> Self {
        Self::append()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_mapping() {
        assert_eq!(SnapshotPolicy::from_threshold(-1), SnapshotPolicy::Never);
        assert_eq!(SnapshotPolicy::from_threshold(0), SnapshotPolicy::Never);
        assert_eq!(SnapshotPolicy::from_threshold(1), SnapshotPolicy::Always);
        assert_eq!(SnapshotPolicy::from_threshold(4), SnapshotPolicy::Every(4));
    }

    #[test]
    fn test_threshold_three_triggers_at_multiples_of_three() {
        let policy = SnapshotPolicy::from_threshold(3);
        let mut last_snapshot = 0;
        let mut triggered = Vec::new();

        for version in 1..=10 {
            if policy.is_due(version, last_snapshot) {
                triggered.push(version);
                last_snapshot = version;
            }
        }

        assert_eq!(triggered, vec![3, 6, 9]);
    }

    #[test]
    fn test_every_counts_from_last_snapshot_not_from_zero() {
        let policy = SnapshotPolicy::Every(3);

        assert!(!policy.is_due(6, 4));
        assert!(policy.is_due(7, 4));
        // 一度の保存で複数イベントが追記されて閾値を飛び越えた場合も作成する
        assert!(policy.is_due(9, 4));
    }

    #[test]
    fn test_never_and_always() {
        assert!(!SnapshotPolicy::Never.is_due(100, 0));
        assert!(SnapshotPolicy::Always.is_due(1, 1));
    }

    #[test]
    fn test_mode_to_expected_version() {
        assert_eq!(
            SaveFlags::create().mode.expected_version(),
            ExpectedVersion::NoStream
        );
        assert_eq!(
            SaveFlags::append().mode.expected_version(),
            ExpectedVersion::Any
        );
        assert_eq!(
            SaveFlags::append_expecting(2).mode.expected_version(),
            ExpectedVersion::Exact(2)
        );
        assert_eq!(
            SaveFlags::append_expecting(0).mode.expected_version(),
            ExpectedVersion::NoStream
        );
        assert_eq!(SaveFlags::create().mode.open_mode(), OpenMode::Create);
    }

    #[test]
    fn test_builder_sets_snapshot_policy() {
        let flags = SaveFlags::append().with_snapshot_threshold(5);

        assert_eq!(flags.snapshot, SnapshotPolicy::Every(5));
        assert_eq!(flags.mode, SaveMode::Append { expected: None });
    }
}
