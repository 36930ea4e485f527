use log::warn;
use serde::Serialize;
use std::{convert::Infallible, sync::Arc};
use warp::{
    reject::{self, Rejection},
    reply::{self, Reply},
    Filter,
};

use crate::controllers::{QuizController, Receipt};
use crate::error::QuizError;
use crate::gate;

#[derive(Clone, Debug, Serialize)]
pub struct ErrorReply {
    pub accepted: bool,
    pub reason: QuizError,
}

pub fn error_reply(reason: QuizError) -> reply::Response {
    reply::with_status(
        reply::json(&ErrorReply {
            accepted: false,
            reason,
        }),
        reason.status(),
    )
    .into_response()
}

pub fn with_quiz_controller(
    quiz_controller: QuizController,
) -> impl Filter<Extract = (QuizController,), Error = Infallible> + Clone {
    warp::any().map(move || quiz_controller.clone())
}

/// Optional `Authorization: Receipt <token>` header. Present but invalid
/// receipts are rejected rather than ignored.
pub fn receipt(
    quiz_controller: QuizController,
) -> impl Filter<Extract = (Option<Receipt>,), Error = Rejection> + Clone {
    warp::header::optional("Authorization")
        .and(with_quiz_controller(quiz_controller))
        .and_then(
            move |auth: Option<String>, quiz_controller: QuizController| async move {
                match auth {
                    None => Ok(None),
                    Some(auth) => {
                        let mut parts = auth.splitn(2, ' ');
                        let kind = parts
                            .next()
                            .ok_or_else(|| reject::custom(QuizError::Unauthorized))?;
                        let value = parts
                            .next()
                            .ok_or_else(|| reject::custom(QuizError::Unauthorized))?;

                        if !kind.eq_ignore_ascii_case("receipt") {
                            return Err(reject::custom(QuizError::Unauthorized));
                        }

                        quiz_controller
                            .decode_receipt(value)
                            .map(Some)
                            .map_err(|_err| reject::custom(QuizError::Unauthorized))
                    }
                }
            },
        )
}

/// Admin guard on the `X-Admin-Token` header. Without a configured token every
/// admin request is refused.
pub fn admin(
    admin_token: Option<String>,
) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    let admin_token = Arc::new(admin_token);

    warp::header::optional("X-Admin-Token")
        .and_then(move |supplied: Option<String>| {
            let admin_token = admin_token.clone();
            async move {
                match (admin_token.as_ref(), supplied) {
                    (Some(expected), Some(supplied)) if gate::verify_token(expected, &supplied) => {
                        Ok(())
                    }
                    _ => Err(reject::custom(QuizError::Unauthorized)),
                }
            }
        })
        .untuple_one()
}

pub async fn handle_rejection(err: Rejection) -> Result<reply::Response, Infallible> {
    let reason = if let Some(reason) = err.find::<QuizError>() {
        *reason
    } else if err.is_not_found() {
        QuizError::UnknownRoute
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        QuizError::MethodNotAllowed
    } else {
        if err.find::<warp::filters::body::BodyDeserializeError>().is_none() {
            warn!("unhandled rejection: {:?}", err);
        }
        QuizError::MalformedRequest
    };

    Ok(error_reply(reason))
}
