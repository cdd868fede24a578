use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::api::dtos::{
    CreateGroupRequest, DirectConversationRequest, InviteParticipantsRequest, MessagePageQuery,
    PaginationParams, SendMessageRequest, SettingsRequest, UploadQuery,
};
use crate::api::routes::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/conversations")
            .route("", web::get().to(list_conversations))
            .route("/direct", web::post().to(open_direct))
            .route("/groups", web::post().to(create_group))
            .route("/{id}", web::get().to(get_conversation))
            .route("/{id}/settings", web::patch().to(update_settings))
            .route("/{id}/participants", web::post().to(invite_participants))
            .route("/{id}/leave", web::post().to(leave_conversation))
            .route("/{id}/messages", web::get().to(list_messages))
            .route("/{id}/messages", web::post().to(send_message))
            .route("/{id}/attachments", web::post().to(upload_attachment)),
    );
}

async fn list_conversations(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    query: web::Query<PaginationParams>,
) -> AppResult<HttpResponse> {
    let result = state
        .conversation_service
        .list(user.caller(), query.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

async fn open_direct(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    payload: web::Json<DirectConversationRequest>,
) -> AppResult<HttpResponse> {
    let result = state
        .conversation_service
        .find_or_create_direct(user.caller(), payload.user_id)
        .await?;
    if result.created {
        Ok(HttpResponse::Created().json(result))
    } else {
        Ok(HttpResponse::Ok().json(result))
    }
}

async fn create_group(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    payload: web::Json<CreateGroupRequest>,
) -> AppResult<HttpResponse> {
    let result = state
        .conversation_service
        .create_group(user.caller(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(result))
}

async fn get_conversation(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let result = state
        .conversation_service
        .get(user.caller(), path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

async fn update_settings(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    payload: web::Json<SettingsRequest>,
) -> AppResult<HttpResponse> {
    let result = state
        .conversation_service
        .update_settings(user.caller(), path.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

async fn invite_participants(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    payload: web::Json<InviteParticipantsRequest>,
) -> AppResult<HttpResponse> {
    let result = state
        .conversation_service
        .invite(user.caller(), path.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

async fn leave_conversation(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    state
        .conversation_service
        .leave(user.caller(), path.into_inner())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn list_messages(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    query: web::Query<MessagePageQuery>,
) -> AppResult<HttpResponse> {
    let result = state
        .message_service
        .list_page(user.caller(), path.into_inner(), query.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

async fn send_message(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    payload: web::Json<SendMessageRequest>,
) -> AppResult<HttpResponse> {
    let result = state
        .message_service
        .send(user.caller(), path.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(result))
}

async fn upload_attachment(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    let result = state
        .message_service
        .upload(user.caller(), path.into_inner(), &query.file_name, &body)
        .await?;
    Ok(HttpResponse::Created().json(result))
}
