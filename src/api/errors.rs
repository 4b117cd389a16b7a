//! Service error to [`ApiError`] conversions
//!
//! Handlers use `?` on service results; the status code follows from the
//! error code chosen here.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};

use super::middleware::ApiError;
use crate::models::ValidationError;
use crate::services::{
    AdminServiceError, CurriculumServiceError, EngagementServiceError, FeedServiceError,
    LearningServiceError, LlmError, SocialServiceError, StatsServiceError, TaxonomyServiceError,
    UserServiceError,
};

fn internal(e: anyhow::Error) -> ApiError {
    ApiError::internal_error(format!("{:#}", e))
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::validation_error(e.0)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation_error(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::validation_error(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation_error(rejection.body_text())
    }
}

impl From<LlmError> for ApiError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Request(_) => ApiError::bad_gateway(e.to_string()),
            LlmError::InvalidResponse(_) => ApiError::validation_error(e.to_string()),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::InvalidCredentials => ApiError::unauthorized(e.to_string()),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::EmailExists(_) | UserServiceError::NameExists(_) => {
                ApiError::conflict(e.to_string())
            }
            UserServiceError::NotFound => ApiError::not_found(e.to_string()),
            UserServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<CurriculumServiceError> for ApiError {
    fn from(e: CurriculumServiceError) -> Self {
        match e {
            CurriculumServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CurriculumServiceError::NotFound | CurriculumServiceError::WeekNotFound(_) => {
                ApiError::not_found(e.to_string())
            }
            CurriculumServiceError::PermissionDenied => ApiError::forbidden(e.to_string()),
            CurriculumServiceError::CountOver => ApiError::conflict(e.to_string()),
            CurriculumServiceError::Llm(e) => e.into(),
            CurriculumServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<LearningServiceError> for ApiError {
    fn from(e: LearningServiceError) -> Self {
        match e {
            LearningServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            LearningServiceError::CurriculumNotFound
            | LearningServiceError::WeekNotFound(_)
            | LearningServiceError::SummaryNotFound
            | LearningServiceError::FeedbackNotFound => ApiError::not_found(e.to_string()),
            LearningServiceError::PermissionDenied => ApiError::forbidden(e.to_string()),
            LearningServiceError::FeedbackAlreadyExists => ApiError::conflict(e.to_string()),
            LearningServiceError::Llm(e) => e.into(),
            LearningServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<StatsServiceError> for ApiError {
    fn from(e: StatsServiceError) -> Self {
        match e {
            StatsServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            StatsServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<SocialServiceError> for ApiError {
    fn from(e: SocialServiceError) -> Self {
        match e {
            SocialServiceError::SelfFollow => ApiError::validation_error(e.to_string()),
            SocialServiceError::UserNotFound | SocialServiceError::NotFollowing => {
                ApiError::not_found(e.to_string())
            }
            SocialServiceError::AlreadyFollowing => ApiError::conflict(e.to_string()),
            SocialServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            SocialServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<EngagementServiceError> for ApiError {
    fn from(e: EngagementServiceError) -> Self {
        match e {
            EngagementServiceError::CurriculumNotFound | EngagementServiceError::NotFound(_) => {
                ApiError::not_found(e.to_string())
            }
            EngagementServiceError::CurriculumNotAccessible
            | EngagementServiceError::PermissionDenied => ApiError::forbidden(e.to_string()),
            EngagementServiceError::AlreadyExists(_) => ApiError::conflict(e.to_string()),
            EngagementServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            EngagementServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<TaxonomyServiceError> for ApiError {
    fn from(e: TaxonomyServiceError) -> Self {
        match e {
            TaxonomyServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            TaxonomyServiceError::TagNotFound
            | TaxonomyServiceError::CategoryNotFound
            | TaxonomyServiceError::CurriculumNotFound => ApiError::not_found(e.to_string()),
            TaxonomyServiceError::AlreadyExists(_)
            | TaxonomyServiceError::TagInUse
            | TaxonomyServiceError::CategoryInUse => ApiError::conflict(e.to_string()),
            TaxonomyServiceError::PermissionDenied => ApiError::forbidden(e.to_string()),
            TaxonomyServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<FeedServiceError> for ApiError {
    fn from(e: FeedServiceError) -> Self {
        match e {
            FeedServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<AdminServiceError> for ApiError {
    fn from(e: AdminServiceError) -> Self {
        match e {
            AdminServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            AdminServiceError::CurriculumNotFound => ApiError::not_found(e.to_string()),
            AdminServiceError::InternalError(e) => internal(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_llm_errors_split_by_cause() {
        let transport: ApiError = CurriculumServiceError::Llm(LlmError::Request("timeout".into())).into();
        assert_eq!(transport.status(), StatusCode::BAD_GATEWAY);
        let garbage: ApiError = LearningServiceError::Llm(LlmError::InvalidResponse("not json".into())).into();
        assert_eq!(garbage.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_conflicts_and_permissions() {
        let e: ApiError = CurriculumServiceError::CountOver.into();
        assert_eq!(e.status(), StatusCode::CONFLICT);
        let e: ApiError = EngagementServiceError::CurriculumNotAccessible.into();
        assert_eq!(e.status(), StatusCode::FORBIDDEN);
        let e: ApiError = SocialServiceError::SelfFollow.into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
        let e: ApiError = TaxonomyServiceError::TagInUse.into();
        assert_eq!(e.error.code, "CONFLICT");
    }
}
