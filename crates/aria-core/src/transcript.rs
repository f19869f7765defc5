use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Agent,
    User,
}

/// One finalized transcription segment as delivered by a speaker's snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    #[serde(alias = "receivedAt")]
    pub received_at_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Utterance {
    pub speaker: Speaker,
    pub text: String,
    pub received_at_ms: i64,
}

impl Utterance {
    fn from_segment(speaker: Speaker, segment: Segment) -> Self {
        Self {
            speaker,
            text: segment.text,
            received_at_ms: segment.received_at_ms,
        }
    }
}

/// Time-ordered view of both speakers. Rebuilt on every snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ConversationLog(Vec<Utterance>);

impl ConversationLog {
    pub fn as_slice(&self) -> &[Utterance] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Utterance> {
        self.0.iter()
    }
}

/// Stable merge by `received_at_ms`. Equal timestamps keep agent-then-user
/// concatenation order.
pub fn merge(agent: &[Utterance], user: &[Utterance]) -> ConversationLog {
    let mut merged = Vec::with_capacity(agent.len() + user.len());
    merged.extend_from_slice(agent);
    merged.extend_from_slice(user);
    merged.sort_by_key(|utterance| utterance.received_at_ms);
    ConversationLog(merged)
}

#[derive(Debug, Clone, Default)]
pub struct TranscriptMerger {
    agent: Vec<Utterance>,
    user: Vec<Utterance>,
    log: ConversationLog,
}

impl TranscriptMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the agent snapshot and returns the utterances finalized since
    /// the previous one: everything past the prefix both snapshots share. A
    /// restarted session diverges at the first segment, so all of it is new
    /// even when the length did not change.
    pub fn replace_agent(&mut self, snapshot: Vec<Segment>) -> Vec<Utterance> {
        let previous = std::mem::take(&mut self.agent);
        self.agent = snapshot
            .into_iter()
            .map(|segment| Utterance::from_segment(Speaker::Agent, segment))
            .collect();
        self.rebuild();

        let shared = previous
            .iter()
            .zip(&self.agent)
            .take_while(|(old, new)| old == new)
            .count();
        self.agent[shared..].to_vec()
    }

    pub fn replace_user(&mut self, snapshot: Vec<Segment>) {
        self.user = snapshot
            .into_iter()
            .map(|segment| Utterance::from_segment(Speaker::User, segment))
            .collect();
        self.rebuild();
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    fn rebuild(&mut self) {
        self.log = merge(&self.agent, &self.user);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str, at: i64) -> Segment {
        Segment {
            text: text.to_string(),
            received_at_ms: at,
        }
    }

    fn utt(speaker: Speaker, text: &str, at: i64) -> Utterance {
        Utterance {
            speaker,
            text: text.to_string(),
            received_at_ms: at,
        }
    }

    #[test]
    fn merged_log_is_ordered_and_complete() {
        let agent = vec![
            utt(Speaker::Agent, "bonjour", 100),
            utt(Speaker::Agent, "un instant", 400),
            utt(Speaker::Agent, "voici", 900),
        ];
        let user = vec![
            utt(Speaker::User, "allo", 50),
            utt(Speaker::User, "mon email", 500),
        ];

        let log = merge(&agent, &user);
        assert_eq!(log.len(), agent.len() + user.len());
        assert!(log
            .as_slice()
            .windows(2)
            .all(|pair| pair[0].received_at_ms <= pair[1].received_at_ms));
        let texts: Vec<&str> = log.iter().map(|u| u.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["allo", "bonjour", "un instant", "mon email", "voici"]
        );
    }

    #[test]
    fn equal_timestamps_keep_concatenation_order() {
        let agent = vec![utt(Speaker::Agent, "a", 10), utt(Speaker::Agent, "b", 10)];
        let user = vec![utt(Speaker::User, "c", 10)];

        let first = merge(&agent, &user);
        let second = merge(&agent, &user);
        assert_eq!(first, second);
        let texts: Vec<&str> = first.iter().map(|u| u.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn empty_inputs_yield_empty_log() {
        assert!(merge(&[], &[]).is_empty());
        assert!(TranscriptMerger::new().log().is_empty());
    }

    #[test]
    fn replace_agent_reports_only_new_utterances() {
        let mut merger = TranscriptMerger::new();
        let first = merger.replace_agent(vec![seg("one", 1)]);
        assert_eq!(first.len(), 1);

        let second = merger.replace_agent(vec![seg("one", 1), seg("two", 2)]);
        assert_eq!(second, vec![utt(Speaker::Agent, "two", 2)]);

        let unchanged = merger.replace_agent(vec![seg("one", 1), seg("two", 2)]);
        assert!(unchanged.is_empty());
    }

    #[test]
    fn shorter_agent_snapshot_is_treated_as_fresh() {
        let mut merger = TranscriptMerger::new();
        merger.replace_agent(vec![seg("one", 1), seg("two", 2)]);
        let restarted = merger.replace_agent(vec![seg("fresh", 10)]);
        assert_eq!(restarted, vec![utt(Speaker::Agent, "fresh", 10)]);
    }

    #[test]
    fn same_length_snapshot_with_new_content_is_fresh() {
        let mut merger = TranscriptMerger::new();
        merger.replace_agent(vec![seg("Bonjour", 1)]);
        let restarted = merger.replace_agent(vec![seg("ID: 9\nName: Marie Martin", 5)]);
        assert_eq!(
            restarted,
            vec![utt(Speaker::Agent, "ID: 9\nName: Marie Martin", 5)]
        );
    }

    #[test]
    fn truncated_snapshot_reports_nothing_new() {
        let mut merger = TranscriptMerger::new();
        merger.replace_agent(vec![seg("one", 1), seg("two", 2)]);
        assert!(merger.replace_agent(vec![seg("one", 1)]).is_empty());
        assert_eq!(merger.log().len(), 1);
    }

    #[test]
    fn user_snapshot_tags_speaker_and_rebuilds_log() {
        let mut merger = TranscriptMerger::new();
        merger.replace_agent(vec![seg("hello", 20)]);
        merger.replace_user(vec![seg("hi", 10)]);
        let log = merger.log();
        assert_eq!(log.len(), 2);
        assert_eq!(log.as_slice()[0].speaker, Speaker::User);
        assert_eq!(log.as_slice()[1].speaker, Speaker::Agent);
    }
}
