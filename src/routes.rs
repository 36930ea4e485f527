use chrono::Utc;
use serde::{Deserialize, Serialize};
use warp::{
    http::StatusCode,
    reject::Rejection,
    reply::{self, Reply},
    Filter,
};

use crate::controllers::{QuizController, QuizPage, Receipt, ResultsPage, SubmitRequest};
use crate::error::QuizError;
use crate::filters::{self, error_reply};
use crate::models::{Quiz, QuizId};
use crate::presentation::{QuizResults, QuizView};

const MAX_BODY: u64 = 16 * 1024;

#[derive(Clone, Debug, Serialize)]
struct QuizListReply<'a> {
    quizzes: Vec<QuizView<'a>>,
}

#[derive(Clone, Debug, Serialize)]
struct ResultsListReply<'a> {
    results: Vec<QuizResults<'a>>,
}

#[derive(Clone, Debug, Serialize)]
struct SubmitReply {
    accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    receipt: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct VerifyPasswordRequest {
    quiz_id: QuizId,
    password: String,
}

#[derive(Clone, Debug, Serialize)]
struct AcceptedReply {
    accepted: bool,
}

fn respond(result: Result<reply::Response, QuizError>) -> reply::Response {
    result.unwrap_or_else(error_reply)
}

fn list_reply(pages: Vec<QuizPage>) -> reply::Response {
    let reply = QuizListReply {
        quizzes: pages.iter().map(QuizPage::view).collect(),
    };
    reply::json(&reply).into_response()
}

fn results_reply(page: &ResultsPage) -> reply::Response {
    match page.view() {
        Some(results) => reply::json(&results).into_response(),
        None => error_reply(QuizError::NotEnded),
    }
}

pub fn routes(
    quiz_controller: QuizController,
    admin_token: Option<String>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list_quizzes = warp::path!("quizzes")
        .and(warp::get())
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .map(|quiz_controller: QuizController| {
            respond(quiz_controller.list_quizzes(Utc::now()).map(list_reply))
        });

    let active_quiz = warp::path!("quizzes" / "active")
        .and(warp::get())
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .map(|quiz_controller: QuizController| {
            respond(
                quiz_controller
                    .active_quiz(Utc::now())
                    .map(|page| reply::json(&page.view()).into_response()),
            )
        });

    let get_quiz = warp::path!("quizzes" / u32)
        .and(warp::get())
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .map(|id: u32, quiz_controller: QuizController| {
            respond(
                quiz_controller
                    .quiz(QuizId(id), Utc::now())
                    .map(|page| reply::json(&page.view()).into_response()),
            )
        });

    let all_results = warp::path!("quizzes" / "results")
        .and(warp::get())
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .map(|quiz_controller: QuizController| {
            respond(quiz_controller.all_results(Utc::now()).map(|pages| {
                let reply = ResultsListReply {
                    results: pages.iter().filter_map(ResultsPage::view).collect(),
                };
                reply::json(&reply).into_response()
            }))
        });

    let quiz_results = warp::path!("quizzes" / u32 / "results")
        .and(warp::get())
        .and(filters::receipt(quiz_controller.clone()))
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .map(
            |id: u32, receipt: Option<Receipt>, quiz_controller: QuizController| {
                respond(
                    quiz_controller
                        .results(QuizId(id), receipt.as_ref(), Utc::now())
                        .map(|page| results_reply(&page)),
                )
            },
        );

    let stats = warp::path!("quizzes" / "stats")
        .and(warp::get())
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .map(|quiz_controller: QuizController| {
            respond(
                quiz_controller
                    .global_statistics(Utc::now())
                    .map(|stats| reply::json(&stats).into_response()),
            )
        });

    let congregation_stats = warp::path!("quizzes" / "congregation-stats")
        .and(warp::get())
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .map(|quiz_controller: QuizController| {
            respond(
                quiz_controller
                    .congregation_leaderboard(Utc::now())
                    .map(|leaderboard| {
                        reply::json(&serde_json::json!({ "leaderboard": leaderboard }))
                            .into_response()
                    }),
            )
        });

    let verify_password = warp::path!("quizzes" / "verify-password")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY))
        .and(warp::body::json())
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .map(
            |body: VerifyPasswordRequest, quiz_controller: QuizController| {
                respond(
                    quiz_controller
                        .verify_password(body.quiz_id, &body.password, Utc::now())
                        .map(|()| reply::json(&AcceptedReply { accepted: true }).into_response()),
                )
            },
        );

    let submit = warp::path!("quizzes" / "submit")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY))
        .and(warp::body::json())
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .and_then(
            |body: SubmitRequest, quiz_controller: QuizController| async move {
                let accepted = quiz_controller.submit(body, Utc::now()).await.map(|accepted| {
                    let reply = SubmitReply {
                        accepted: true,
                        is_correct: Some(accepted.is_correct),
                        receipt: Some(accepted.receipt),
                    };
                    reply::with_status(reply::json(&reply), StatusCode::CREATED).into_response()
                });

                Ok::<_, Rejection>(respond(accepted))
            },
        );

    let create_quiz = warp::path!("admin" / "quizzes")
        .and(warp::post())
        .and(filters::admin(admin_token.clone()))
        .and(warp::body::content_length_limit(MAX_BODY))
        .and(warp::body::json())
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .map(|quiz: Quiz, quiz_controller: QuizController| {
            respond(quiz_controller.create_quiz(quiz).map(|()| {
                reply::with_status(reply::json(&AcceptedReply { accepted: true }), StatusCode::CREATED)
                    .into_response()
            }))
        });

    let update_quiz = warp::path!("admin" / "quizzes" / u32)
        .and(warp::put())
        .and(filters::admin(admin_token.clone()))
        .and(warp::body::content_length_limit(MAX_BODY))
        .and(warp::body::json())
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .map(|id: u32, quiz: Quiz, quiz_controller: QuizController| {
            respond(
                quiz_controller
                    .update_quiz(QuizId(id), quiz)
                    .map(|()| reply::json(&AcceptedReply { accepted: true }).into_response()),
            )
        });

    let end_quiz = warp::path!("admin" / "quizzes" / u32 / "end")
        .and(warp::post())
        .and(filters::admin(admin_token.clone()))
        .and(filters::with_quiz_controller(quiz_controller.clone()))
        .map(|id: u32, quiz_controller: QuizController| {
            respond(
                quiz_controller
                    .end_quiz(QuizId(id), Utc::now())
                    .map(|()| reply::json(&AcceptedReply { accepted: true }).into_response()),
            )
        });

    let delete_quiz = warp::path!("admin" / "quizzes" / u32)
        .and(warp::delete())
        .and(filters::admin(admin_token))
        .and(filters::with_quiz_controller(quiz_controller))
        .map(|id: u32, quiz_controller: QuizController| {
            respond(
                quiz_controller
                    .delete_quiz(QuizId(id))
                    .map(|()| reply::json(&AcceptedReply { accepted: true }).into_response()),
            )
        });

    list_quizzes
        .or(active_quiz)
        .or(all_results)
        .or(stats)
        .or(congregation_stats)
        .or(get_quiz)
        .or(quiz_results)
        .or(verify_password)
        .or(submit)
        .or(create_quiz)
        .or(update_quiz)
        .or(end_quiz)
        .or(delete_quiz)
}
