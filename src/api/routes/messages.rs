use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::api::dtos::{EditMessageRequest, ReactionRequest};
use crate::api::routes::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/messages")
            .route("/{id}", web::patch().to(edit_message))
            .route("/{id}", web::delete().to(delete_message))
            .route("/{id}/reactions", web::post().to(add_reaction))
            .route("/{id}/reactions/{emoji}", web::delete().to(remove_reaction)),
    );
}

async fn edit_message(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    payload: web::Json<EditMessageRequest>,
) -> AppResult<HttpResponse> {
    let result = state
        .message_service
        .edit(user.caller(), path.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

async fn delete_message(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let result = state
        .message_service
        .delete(user.caller(), path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

async fn add_reaction(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    payload: web::Json<ReactionRequest>,
) -> AppResult<HttpResponse> {
    let result = state
        .message_service
        .add_reaction(user.caller(), path.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(result))
}

async fn remove_reaction(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<(Uuid, String)>,
) -> AppResult<HttpResponse> {
    let (message_id, emoji) = path.into_inner();
    let result = state
        .message_service
        .remove_reaction(user.caller(), message_id, &emoji)
        .await?;
    Ok(HttpResponse::Ok().json(result))
}
