//! Cross-app sync helpers.
//!
//! Each `sync_*` function turns a local mutation into a fire-and-forget
//! event for another app. Nobody checks that the other side is listening;
//! with no subscribers the publish is a silent no-op. The remaining
//! functions are pure and deterministic.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    Bus, RelayEvent, TOPIC_PLACE_TRUST_SIGNAL, TOPIC_PLANNER_THOUGHT_SYNCED,
    TOPIC_STORE_STORY_SUGGESTED,
};

/// Maximum number of goal suggestions derived from thoughts.
pub const MAX_GOAL_SUGGESTIONS: usize = 5;

/// Completed activities needed before a story update is suggested.
pub const MIN_ACTIVITIES_FOR_STORY: usize = 3;

pub const KIND_THOUGHT_COMPLETED: &str = "thought.completed";
pub const KIND_PURCHASE_COMPLETED: &str = "purchase.completed";
pub const KIND_MILESTONE_REACHED: &str = "milestone.reached";

/// A Brain journal entry, reduced to what other apps care about.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thought {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub action_items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub amount_cents: u64,
}

/// Order history of one Store seller.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_sales: u64,
    pub completed_orders: u64,
    /// Mean review score on a 0–5 scale.
    pub average_rating: f64,
    /// Fraction of orders that ended in a dispute, 0–1.
    pub dispute_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub user_id: String,
    pub goal_title: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgress {
    pub goal_title: String,
    #[serde(default)]
    pub completed_activities: Vec<String>,
}

/// Tell Planner about a completed thought.
///
/// The embedding and valence fields are placeholders until Brain
/// computes them.
pub fn sync_thought_to_planner(bus: &Bus<RelayEvent>, thought: &Thought) {
    let event = RelayEvent::topic(
        TOPIC_PLANNER_THOUGHT_SYNCED,
        KIND_THOUGHT_COMPLETED,
        json!({
            "thoughtId": thought.id,
            "userId": thought.user_id,
            "vector": [],
            "valence": 0.0,
        }),
    );
    let delivered = bus.emit(&event);
    tracing::debug!(thought_id = %thought.id, delivered, "Thought synced to planner");
}

/// Action items across `thoughts`, deduplicated in first-seen order and
/// truncated to [`MAX_GOAL_SUGGESTIONS`].
pub fn extract_goal_suggestions(thoughts: &[Thought]) -> Vec<String> {
    let mut suggestions: Vec<String> = Vec::with_capacity(MAX_GOAL_SUGGESTIONS);
    for item in thoughts.iter().flat_map(|t| t.action_items.iter()) {
        if suggestions.len() == MAX_GOAL_SUGGESTIONS {
            break;
        }
        if !suggestions.contains(item) {
            suggestions.push(item.clone());
        }
    }
    suggestions
}

/// Tell Place that a purchase completed so it can adjust trust.
pub fn sync_purchase_to_trust(bus: &Bus<RelayEvent>, purchase: &Purchase) {
    let event = RelayEvent::topic(
        TOPIC_PLACE_TRUST_SIGNAL,
        KIND_PURCHASE_COMPLETED,
        json!({
            "purchaseId": purchase.id,
            "buyerId": purchase.buyer_id,
            "sellerId": purchase.seller_id,
            "amountCents": purchase.amount_cents,
            "signal": "purchase",
        }),
    );
    let delivered = bus.emit(&event);
    tracing::debug!(purchase_id = %purchase.id, delivered, "Purchase synced to trust");
}

/// Seller reliability in `[0, 1]`:
/// `0.4 * completion + 0.4 * rating / 5 + 0.2 * (1 - min(2 * disputes, 1))`,
/// where completion is `completed_orders / total_sales`.
///
/// A seller without sales has no track record and scores 0. Each term is
/// clamped to its own range first, so out-of-range inputs cannot push the
/// score outside `[0, 1]`.
pub fn compute_store_reliability(stats: &StoreStats) -> f64 {
    if stats.total_sales == 0 {
        return 0.0;
    }
    let completion_rate = unit(stats.completed_orders as f64 / stats.total_sales as f64);
    let rating = unit(stats.average_rating / 5.0);
    let disputes = unit(2.0 * stats.dispute_rate);

    let score = 0.4 * completion_rate + 0.4 * rating + 0.2 * (1.0 - disputes);
    score.clamp(0.0, 1.0)
}

fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Story text Store shows for a Planner milestone.
pub fn milestone_story(milestone: &Milestone) -> String {
    format!(
        "Milestone reached on \"{}\": {}",
        milestone.goal_title, milestone.title
    )
}

/// Offer a milestone to Store as a profile story. Returns the story text.
pub fn sync_milestone_to_store(bus: &Bus<RelayEvent>, milestone: &Milestone) -> String {
    let story = milestone_story(milestone);
    let event = RelayEvent::topic(
        TOPIC_STORE_STORY_SUGGESTED,
        KIND_MILESTONE_REACHED,
        json!({
            "userId": milestone.user_id,
            "goalTitle": milestone.goal_title,
            "story": story,
        }),
    );
    let delivered = bus.emit(&event);
    tracing::debug!(user_id = %milestone.user_id, delivered, "Milestone synced to store");
    story
}

/// Story suggestions for a goal. Empty until at least
/// [`MIN_ACTIVITIES_FOR_STORY`] activities are completed.
pub fn get_suggested_story_updates(progress: &GoalProgress) -> Vec<String> {
    let count = progress.completed_activities.len();
    if count < MIN_ACTIVITIES_FOR_STORY {
        return Vec::new();
    }
    let latest = progress
        .completed_activities
        .last()
        .map(String::as_str)
        .unwrap_or_default();
    vec![format!(
        "Share your progress on \"{}\": {} activities completed, latest: {}",
        progress.goal_title, count, latest
    )]
}
