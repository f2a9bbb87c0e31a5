use {
    crate::{
        rest::AppState,
        types::{ApiError, ApiResponse, ApiResult, ClaimRequest, ClaimResponse, RewardsSummary},
    },
    axum::{
        extract::{
            rejection::{JsonRejection, PathRejection, QueryRejection},
            Path, Query, State,
        },
        routing::{get, post},
        Json, Router,
    },
    tracing::info,
    vindexer_common::{Pagination, PollStats, VoteRecord},
    vindexer_store::ClaimOutcome,
};

const MISSING_CLAIM_FIELDS: &str = "Missing required fields: pollId, voterAddress, claimTransactionHash";

pub fn create_vote_router() -> Router<AppState> {
    Router::new()
        .route("/polls/:poll_id/votes", get(get_poll_votes))
        .route("/polls/:poll_id/stats", get(get_poll_stats))
        .route("/voters/:address/votes", get(get_voter_votes))
        .route("/voters/:address/rewards", get(get_voter_rewards))
        .route("/rewards/claim", post(claim_reward))
}

pub async fn get_poll_votes(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
    query: Result<Query<Pagination>, QueryRejection>,
) -> ApiResult<Vec<VoteRecord>> {
    let Path(poll_id) = path?;
    let Query(page) = query?;
    let votes = state.store.votes_for_poll(poll_id, page).await?;
    Ok(Json(ApiResponse::success(votes)))
}

pub async fn get_poll_stats(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> ApiResult<PollStats> {
    let Path(poll_id) = path?;
    let stats = state.store.poll_stats(poll_id).await?;
    Ok(Json(ApiResponse::success(stats)))
}

pub async fn get_voter_votes(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Vec<VoteRecord>> {
    let votes = state.store.votes_for_voter(&address).await?;
    Ok(Json(ApiResponse::success(votes)))
}

pub async fn get_voter_rewards(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<RewardsSummary> {
    let rewards = state.store.unclaimed_rewards(&address).await?;
    Ok(Json(ApiResponse::success(RewardsSummary::new(rewards))))
}

/// Records a reward claim. The claim transaction itself is not verified
/// on-chain.
pub async fn claim_reward(
    State(state): State<AppState>,
    payload: Result<Json<ClaimRequest>, JsonRejection>,
) -> ApiResult<ClaimResponse> {
    let Json(request) = payload?;

    let (poll_id, voter_address, claim_hash) = match request {
        ClaimRequest {
            poll_id: Some(poll_id),
            voter_address: Some(voter),
            claim_transaction_hash: Some(hash),
        } if !voter.trim().is_empty() && !hash.trim().is_empty() => (poll_id, voter, hash),
        _ => return Err(ApiError::BadRequest(MISSING_CLAIM_FIELDS.to_string())),
    };

    let outcome = state
        .store
        .mark_reward_claimed(poll_id, &voter_address, &claim_hash)
        .await?;

    let message = match outcome {
        ClaimOutcome::Claimed => {
            info!("Reward for poll {} claimed by {}", poll_id, voter_address);
            "Reward marked as claimed".to_string()
        }
        ClaimOutcome::AlreadyClaimed => "Reward already claimed".to_string(),
        ClaimOutcome::NotFound => {
            return Err(ApiError::NotFound(format!(
                "No vote by {} in poll {}",
                voter_address, poll_id
            )))
        }
    };

    Ok(Json(ApiResponse::success(ClaimResponse {
        poll_id,
        voter_address,
        outcome,
        message,
    })))
}

#[cfg(test)]
mod tests {
    use {
        crate::rest::tests::{get, post_json, send, test_router, test_state},
        axum::http::StatusCode,
        chrono::{TimeZone, Utc},
        rust_decimal::Decimal,
        serde_json::json,
        std::sync::Arc,
        vindexer_common::VoteRecord,
        vindexer_store::{MemoryStore, VoteStore},
    };

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let options = [0u64, 1, 0, 2, 0];
        for (i, option) in options.into_iter().enumerate() {
            let lt = 10 + i as u64;
            let timestamp = Utc.timestamp_opt(1_700_000_000 + lt as i64, 0).unwrap();
            let voter = format!("EQvoter{}", i);
            store
                .record_vote(VoteRecord::new(7, voter, option, timestamp, format!("{:064x}", lt), lt))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_poll_votes_and_pagination() {
        let store = seeded_store().await;

        let (status, body) = send(test_router(test_state(store.clone())), get("/api/polls/7/votes")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"].as_array().unwrap().len(), 5);
        assert_eq!(body["data"][0]["pollId"], 7);
        assert_eq!(body["data"][0]["voterAddress"], "EQvoter0");

        let (_, body) = send(
            test_router(test_state(store.clone())),
            get("/api/polls/7/votes?page=2&limit=2"),
        )
        .await;
        let lts: Vec<u64> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|vote| vote["lt"].as_u64().unwrap())
            .collect();
        assert_eq!(lts, vec![12, 13]);

        let (_, body) = send(
            test_router(test_state(store)),
            get("/api/polls/7/votes?limit=0"),
        )
        .await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_parameters_keep_envelope() {
        let store = seeded_store().await;
        for uri in [
            "/api/polls/abc/votes",
            "/api/polls/7/votes?limit=x",
            "/api/polls/-1/stats",
        ] {
            let (status, body) = send(test_router(test_state(store.clone())), get(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["success"], false, "{}", uri);
            assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()), "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_poll_stats() {
        let store = seeded_store().await;
        let (status, body) = send(test_router(test_state(store)), get("/api/polls/7/stats")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["totalVotes"], 5);
        assert_eq!(body["data"]["voteBreakdown"], json!({ "0": 3, "1": 1, "2": 1 }));
    }

    #[tokio::test]
    async fn test_voter_votes_and_rewards() {
        let store = seeded_store().await;
        store
            .set_reward_amount(7, "EQvoter1", Decimal::new(25, 1))
            .await
            .unwrap();

        let router = test_router(test_state(store.clone()));
        let (_, body) = send(router.clone(), get("/api/voters/EQvoter1/votes")).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, body) = send(router, get("/api/voters/EQvoter1/rewards")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["count"], 1);
        assert_eq!(body["data"]["totalRewardValue"], "2.5");
        assert_eq!(body["data"]["rewards"][0]["pollId"], 7);
    }

    #[tokio::test]
    async fn test_claim_validation() {
        let store = seeded_store().await;
        let (status, body) = send(
            test_router(test_state(store)),
            post_json("/api/rewards/claim", json!({ "pollId": 7, "voterAddress": "EQvoter0" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(
            body["error"],
            "Missing required fields: pollId, voterAddress, claimTransactionHash"
        );
    }

    #[tokio::test]
    async fn test_claim_malformed_body() {
        let store = seeded_store().await;
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/rewards/claim")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{not json"))
            .unwrap();
        let (status, body) = send(test_router(test_state(store)), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_claim_is_idempotent() {
        let store = seeded_store().await;
        let router = test_router(test_state(store.clone()));
        let claim = json!({
            "pollId": 7,
            "voterAddress": "EQvoter2",
            "claimTransactionHash": "claim-hash",
        });

        let (status, body) = send(router.clone(), post_json("/api/rewards/claim", claim.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["outcome"], "claimed");

        let (status, body) = send(router, post_json("/api/rewards/claim", claim)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["outcome"], "already_claimed");

        let vote = store.votes_for_voter("EQvoter2").await.unwrap().remove(0);
        assert!(vote.reward_claimed);
        assert_eq!(vote.claim_transaction_hash.as_deref(), Some("claim-hash"));
    }

    #[tokio::test]
    async fn test_claim_unknown_vote() {
        let store = seeded_store().await;
        let (status, body) = send(
            test_router(test_state(store)),
            post_json(
                "/api/rewards/claim",
                json!({ "pollId": 8, "voterAddress": "EQvoter0", "claimTransactionHash": "h" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }
}
