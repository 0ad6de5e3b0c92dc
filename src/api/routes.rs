use std::{convert::Infallible, sync::Arc};

use warp::{
    filters::BoxedFilter,
    reply::{Reply, Response},
    Filter, Rejection,
};

use crate::{
    api::{handlers, reply::handle_rejection, state::with_state, state::AppState},
    form::FormData,
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    pagination::Query,
    schema::{BookmarkList, Uuid},
};

fn json_body(limit: u64) -> impl Filter<Extract = (FormData,), Error = Rejection> + Clone {
    warp::body::content_length_limit(limit).and(warp::body::json())
}

fn auth(state: Arc<AppState>) -> BoxedFilter<(Response,)> {
    let limit = state.config.max_body_size;

    let login = warp::path!("auth" / "token" / "login")
        .and(warp::post())
        .and(json_body(limit))
        .and(with_state(state.clone()))
        .and_then(handlers::auth::login);

    let logout = warp::path!("auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(handlers::auth::logout);

    login.or(logout).unify().boxed()
}

fn users(state: Arc<AppState>) -> BoxedFilter<(Response,)> {
    let limit = state.config.max_body_size;

    let list = warp::path!("users")
        .and(warp::get())
        .and(warp::query::<Query>())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::users::list);

    let register = warp::path!("users")
        .and(warp::post())
        .and(json_body(limit))
        .and(with_state(state.clone()))
        .and_then(handlers::users::register);

    let me = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::users::me);

    let set_password = warp::path!("users" / "set_password")
        .and(warp::post())
        .and(json_body(limit))
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::users::change_password);

    let subscriptions = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(warp::query::<Query>())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::users::subscriptions);

    let retrieve = warp::path!("users" / Uuid)
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::users::retrieve);

    let subscribe = warp::path!("users" / Uuid / "subscribe")
        .and(warp::post())
        .and(warp::query::<Query>())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::users::add_subscription);

    let unsubscribe = warp::path!("users" / Uuid / "subscribe")
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(handlers::users::remove_subscription);

    list.or(register)
        .unify()
        .or(me)
        .unify()
        .or(set_password)
        .unify()
        .or(subscriptions)
        .unify()
        .or(retrieve)
        .unify()
        .or(subscribe)
        .unify()
        .or(unsubscribe)
        .unify()
        .boxed()
}

fn tags(state: Arc<AppState>) -> BoxedFilter<(Response,)> {
    let limit = state.config.max_body_size;

    let list = warp::path!("tags")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::tags::list);

    let create = warp::path!("tags")
        .and(warp::post())
        .and(json_body(limit))
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::tags::create);

    let retrieve = warp::path!("tags" / Uuid)
        .and(warp::get())
        .and(with_state(state))
        .and_then(handlers::tags::retrieve);

    list.or(create).unify().or(retrieve).unify().boxed()
}

fn ingredients(state: Arc<AppState>) -> BoxedFilter<(Response,)> {
    let limit = state.config.max_body_size;

    let list = warp::path!("ingredients")
        .and(warp::get())
        .and(warp::query::<Query>())
        .and(with_state(state.clone()))
        .and_then(handlers::ingredients::list);

    let create = warp::path!("ingredients")
        .and(warp::post())
        .and(json_body(limit))
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::ingredients::create);

    let retrieve = warp::path!("ingredients" / Uuid)
        .and(warp::get())
        .and(with_state(state))
        .and_then(handlers::ingredients::retrieve);

    list.or(create).unify().or(retrieve).unify().boxed()
}

/// Post adds the recipe to `list`, delete removes it
fn bookmarks(
    state: Arc<AppState>,
    list: BookmarkList,
    segment: &'static str,
) -> BoxedFilter<(Response,)> {
    let path = warp::path!("recipes" / Uuid / ..)
        .and(warp::path(segment))
        .and(warp::path::end());

    let add = path
        .clone()
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(move |id: Uuid, session: SessionData, state: Arc<AppState>| {
            handlers::recipes::add_bookmark(list, id, session, state)
        });

    let remove = path
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(move |id: Uuid, session: SessionData, state: Arc<AppState>| {
            handlers::recipes::remove_bookmark(list, id, session, state)
        });

    add.or(remove).unify().boxed()
}

fn recipes(state: Arc<AppState>) -> BoxedFilter<(Response,)> {
    let limit = state.config.max_body_size;

    let list = warp::path!("recipes")
        .and(warp::get())
        .and(warp::query::<Query>())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::recipes::list);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(json_body(limit))
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::recipes::create);

    let download = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::recipes::download_shopping_cart);

    let retrieve = warp::path!("recipes" / Uuid)
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::recipes::retrieve);

    let update = warp::path!("recipes" / Uuid)
        .and(warp::patch())
        .and(json_body(limit))
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::recipes::update);

    let delete = warp::path!("recipes" / Uuid)
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::recipes::delete);

    let favorite = bookmarks(state.clone(), BookmarkList::Favourites, "favorite");
    let shopping_cart = bookmarks(state, BookmarkList::ShoppingCart, "shopping_cart");

    list.or(create)
        .unify()
        .or(download)
        .unify()
        .or(retrieve)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(favorite)
        .unify()
        .or(shopping_cart)
        .unify()
        .boxed()
}

fn forbidden_words(state: Arc<AppState>) -> BoxedFilter<(Response,)> {
    let limit = state.config.max_body_size;

    let list = warp::path!("forbidden_words")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::forbidden_words::list);

    let create = warp::path!("forbidden_words")
        .and(warp::post())
        .and(json_body(limit))
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::forbidden_words::create);

    let delete = warp::path!("forbidden_words" / Uuid)
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(handlers::forbidden_words::delete);

    list.or(create).unify().or(delete).unify().boxed()
}

/// Every route of the service, with rejections rendered as JSON and requests logged
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let api = warp::path("api").and(
        auth(state.clone())
            .or(users(state.clone()))
            .unify()
            .or(tags(state.clone()))
            .unify()
            .or(ingredients(state.clone()))
            .unify()
            .or(recipes(state.clone()))
            .unify()
            .or(forbidden_words(state.clone()))
            .unify(),
    );

    let media = warp::path("media")
        .and(warp::get())
        .and(warp::fs::dir(state.config.media_root.clone()));

    api.or(media.map(|file: warp::fs::File| file.into_response()))
        .unify()
        .recover(handle_rejection)
        .with(warp::log("foodgram"))
}
