pub mod config;
pub mod data;
pub mod dragflow;
pub mod export;
pub mod loader;
pub mod state;
pub mod storage;
pub mod tiers;

use config::{ProviderConfig, DEFAULT_SHOW_ID};
use data::{parse_show_url, Episode, ShowId, TmdbClient};
use dragflow::DragInput;
use export::{download, export_tier_list, HttpImageFetcher};
use loader::{load_show, reset_show};
use log::error;
use state::{AppAction, AppState, LoadStatus, Notice, EXPORT_FAILED_MESSAGE};
use std::rc::Rc;
use storage::{save_partition, BrowserStore};
use tiers::{Location, TierRank, TIER_RANKS};
use wasm_bindgen::prelude::wasm_bindgen;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{window, HtmlInputElement};
use yew::prelude::*;

const PERSIST_FAILED_MESSAGE: &str =
    "Your progress could not be saved in this browser. Changes stay available until the page is reloaded.";

type Dispatcher = UseReducerDispatcher<AppState>;

fn spawn_load(
    provider: Rc<TmdbClient>,
    store: BrowserStore,
    dispatcher: Dispatcher,
    show_id: ShowId,
) {
    spawn_local(async move {
        load_show(&*provider, &store, show_id, move |action| {
            dispatcher.dispatch(action)
        })
        .await;
    });
}

#[function_component(App)]
fn app() -> Html {
    let state = use_reducer(AppState::default);
    let url_input = use_state(String::new);
    let provider = use_memo(|_| TmdbClient::new(ProviderConfig::from_build_env()), ());
    let store = *use_memo(|_| BrowserStore::detect(), ());

    {
        let provider = provider.clone();
        let dispatcher = state.dispatcher();
        use_effect_with_deps(
            move |_| {
                spawn_load(provider, store, dispatcher, DEFAULT_SHOW_ID);
                || ()
            },
            (),
        );
    }

    {
        let handle = state.clone();
        let dispatcher = state.dispatcher();
        use_effect_with_deps(
            move |(target, _revision): &(Option<ShowId>, u64)| {
                if let Some(show_id) = *target {
                    if save_partition(&store, show_id, &handle.partition).is_err() {
                        dispatcher.dispatch(AppAction::PersistFailed(
                            PERSIST_FAILED_MESSAGE.to_string(),
                        ));
                    }
                }
                || ()
            },
            (state.persist_target(), state.revision),
        );
    }

    use_effect_with_deps(
        move |dragging: &bool| {
            if let Some(body) = window().and_then(|w| w.document()).and_then(|d| d.body()) {
                let style = body.style();
                if *dragging {
                    let _ = style.set_property("cursor", "grabbing");
                    let _ = style.set_property("user-select", "none");
                } else {
                    let _ = style.remove_property("cursor");
                    let _ = style.remove_property("user-select");
                }
            }
            || ()
        },
        state.drag.is_dragging(),
    );

    let on_input = {
        let url_input = url_input.clone();
        let dispatcher = state.dispatcher();
        Callback::from(move |event: InputEvent| {
            let input: HtmlInputElement = event.target_unchecked_into();
            url_input.set(input.value());
            dispatcher.dispatch(AppAction::DismissNotice);
        })
    };

    let on_submit = {
        let url_input = url_input.clone();
        let provider = provider.clone();
        let dispatcher = state.dispatcher();
        Callback::from(move |event: SubmitEvent| {
            event.prevent_default();
            match parse_show_url(&url_input) {
                Ok(show_id) => spawn_load(provider.clone(), store, dispatcher.clone(), show_id),
                Err(err) => dispatcher.dispatch(AppAction::InvalidInput(err.to_string())),
            }
        })
    };

    let on_reset = {
        let handle = state.clone();
        let provider = provider.clone();
        let dispatcher = state.dispatcher();
        Callback::from(move |_: MouseEvent| {
            let Some(selection) = handle.selection.clone() else {
                return;
            };
            let prompt = format!(
                "Reset the tier list for \"{}\"? All progress will be lost.",
                selection.name
            );
            let confirmed = window()
                .and_then(|w| w.confirm_with_message(&prompt).ok())
                .unwrap_or(false);
            if !confirmed {
                return;
            }

            let provider = provider.clone();
            let dispatcher = dispatcher.clone();
            spawn_local(async move {
                reset_show(&*provider, &store, selection.id, move |action| {
                    dispatcher.dispatch(action)
                })
                .await;
            });
        })
    };

    let on_export = {
        let handle = state.clone();
        let dispatcher = state.dispatcher();
        Callback::from(move |_: MouseEvent| {
            if handle.exporting {
                return;
            }
            let Some(selection) = handle.selection.clone() else {
                return;
            };
            let partition = handle.partition.clone();
            dispatcher.dispatch(AppAction::ExportStarted);

            let dispatcher = dispatcher.clone();
            spawn_local(async move {
                let outcome = export_tier_list(&HttpImageFetcher, &partition, &selection.name)
                    .await
                    .and_then(|artifact| download(&artifact));
                let result = outcome.map_err(|err| {
                    error!("Export for show {} failed: {}", selection.id, err);
                    EXPORT_FAILED_MESSAGE.to_string()
                });
                dispatcher.dispatch(AppAction::ExportFinished(result));
            });
        })
    };

    let on_dismiss = {
        let dispatcher = state.dispatcher();
        Callback::from(move |_: MouseEvent| dispatcher.dispatch(AppAction::DismissNotice))
    };

    html! {
        <div class="app-container">
            <form class="show-form" onsubmit={on_submit}>
                <input
                    type="text"
                    class="show-input"
                    value={(*url_input).clone()}
                    oninput={on_input}
                    placeholder="Paste a TMDB link, e.g. https://www.themoviedb.org/tv/61222-bojack-horseman"
                    aria-label="TMDB show URL" />
                <button type="submit" class="load-button" disabled={state.is_loading()}>
                    { if state.is_loading() { "Loading…" } else { "Load show" } }
                </button>
            </form>
            { render_notice(&state.notice, on_dismiss) }
            { render_board(&state, &state.dispatcher(), on_reset, on_export) }
            { render_drag_overlay(&state) }
        </div>
    }
}

fn render_notice(notice: &Option<Notice>, on_dismiss: Callback<MouseEvent>) -> Html {
    let (class, message) = match notice {
        Some(Notice::Error(message)) => ("notice notice-error", message),
        Some(Notice::Warning(message)) => ("notice notice-warning", message),
        None => return html! {},
    };

    html! {
        <div class={class} role="alert">
            <p>{ message }</p>
            <button class="notice-dismiss" onclick={on_dismiss} aria-label="Dismiss">{ "×" }</button>
        </div>
    }
}

fn render_board(
    state: &AppState,
    dispatcher: &Dispatcher,
    on_reset: Callback<MouseEvent>,
    on_export: Callback<MouseEvent>,
) -> Html {
    let Some(selection) = &state.selection else {
        return if state.status == LoadStatus::LoadingShow {
            html! { <p class="loading">{ "Loading show…" }</p> }
        } else {
            html! {}
        };
    };

    let body = if state.status == LoadStatus::LoadingEpisodes {
        html! { <p class="loading">{ "Loading episodes…" }</p> }
    } else {
        html! {
            <>
                <div class="tier-board">
                    { for TIER_RANKS.iter().map(|rank| render_tier_row(rank, state, dispatcher)) }
                </div>
                { render_unranked(state, dispatcher) }
            </>
        }
    };

    html! {
        <main class="show-board">
            <div class="show-header">
                <h2 class="show-title">{ &selection.name }</h2>
                <button class="reset-button" onclick={on_reset}
                    title="Reset this show's tier list">
                    { "Reset" }
                </button>
                <button class="export-button" onclick={on_export}
                    disabled={state.exporting || state.status != LoadStatus::Ready}>
                    { if state.exporting { "Exporting…" } else { "Export PNG" } }
                </button>
            </div>
            { body }
        </main>
    }
}

fn render_tier_row(rank: &TierRank, state: &AppState, dispatcher: &Dispatcher) -> Html {
    let location = Location::Tier(rank.name.to_string());
    let hovered = state.drag.hovered() == Some(&location);
    let label_classes = classes!(
        "tier-label",
        rank.css_class,
        if rank.dark_text { "text-black" } else { "text-white" }
    );

    html! {
        <div class="tier-row">
            <div class={label_classes}>{ rank.name }</div>
            <div class={classes!("tier-drop-zone", hovered.then_some("drag-over"))}
                data-drop-target={location.to_string()}>
                { for state.partition.tier(rank.name).iter()
                    .map(|episode| render_card(episode, &location, state, dispatcher)) }
            </div>
        </div>
    }
}

fn render_unranked(state: &AppState, dispatcher: &Dispatcher) -> Html {
    let seasons = state
        .partition
        .season_numbers()
        .into_iter()
        .filter(|season| !state.partition.unranked(*season).is_empty())
        .map(|season| render_season(season, state, dispatcher))
        .collect::<Html>();

    html! {
        <section class="unranked-pool">
            <h3 class="unranked-title">{ "Unranked episodes" }</h3>
            {
                if state.partition.has_unranked() {
                    seasons
                } else {
                    html! { <p class="all-ranked">{ "Every episode has been ranked!" }</p> }
                }
            }
        </section>
    }
}

fn render_season(season: u32, state: &AppState, dispatcher: &Dispatcher) -> Html {
    let location = Location::Unranked(season);
    let collapsed = state.collapsed_seasons.contains(&season);
    let hovered = state.drag.hovered() == Some(&location);
    let content_id = format!("season-content-{}", season);

    let on_toggle = {
        let dispatcher = dispatcher.clone();
        Callback::from(move |_: MouseEvent| dispatcher.dispatch(AppAction::ToggleSeason(season)))
    };

    let content = if collapsed {
        html! {}
    } else {
        html! {
            <div id={content_id.clone()}
                class={classes!("tier-drop-zone", hovered.then_some("drag-over"))}
                data-drop-target={location.to_string()}>
                { for state.partition.unranked(season).iter()
                    .map(|episode| render_card(episode, &location, state, dispatcher)) }
            </div>
        }
    };

    html! {
        <div class="season">
            <button class="season-toggle" onclick={on_toggle}
                aria-expanded={(!collapsed).to_string()} aria-controls={content_id}>
                <h4>{ format!("Season {}", season) }</h4>
                <span class={classes!("chevron", (!collapsed).then_some("open"))}>{ "▾" }</span>
            </button>
            { content }
        </div>
    }
}

/// Drop target under the viewport point, read from the nearest
/// `data-drop-target` ancestor.
fn drop_target_at(x: i32, y: i32) -> Option<Location> {
    let document = window()?.document()?;
    let element = document.element_from_point(x as f32, y as f32)?;
    let zone = element.closest("[data-drop-target]").ok()??;
    zone.get_attribute("data-drop-target")?.parse().ok()
}

fn captured_target(event: &web_sys::PointerEvent) -> Option<web_sys::Element> {
    event
        .target()
        .and_then(|target| target.dyn_into::<web_sys::Element>().ok())
}

fn render_card(
    episode: &Episode,
    source: &Location,
    state: &AppState,
    dispatcher: &Dispatcher,
) -> Html {
    let dragging = state
        .drag
        .item()
        .map(|item| item.episode.id == episode.id)
        .unwrap_or(false);

    let pointer_down = {
        let episode = episode.clone();
        let source = source.clone();
        let dispatcher = dispatcher.clone();
        Callback::from(move |event: web_sys::PointerEvent| {
            if event.button() != 0 {
                return;
            }
            event.prevent_default();
            if let Some(target) = captured_target(&event) {
                let _ = target.set_pointer_capture(event.pointer_id());
            }
            dispatcher.dispatch(AppAction::Drag(DragInput::Start {
                episode: episode.clone(),
                source: source.clone(),
                pointer_id: event.pointer_id(),
                position: (event.client_x() as f64, event.client_y() as f64),
            }));
        })
    };

    let pointer_move = {
        let dispatcher = dispatcher.clone();
        Callback::from(move |event: web_sys::PointerEvent| {
            let captured = captured_target(&event)
                .map(|target| target.has_pointer_capture(event.pointer_id()))
                .unwrap_or(false);
            if !captured {
                return;
            }
            event.prevent_default();
            dispatcher.dispatch(AppAction::Drag(DragInput::Move {
                pointer_id: event.pointer_id(),
                position: (event.client_x() as f64, event.client_y() as f64),
                over: drop_target_at(event.client_x(), event.client_y()),
            }));
        })
    };

    let pointer_up = {
        let dispatcher = dispatcher.clone();
        Callback::from(move |event: web_sys::PointerEvent| {
            if let Some(target) = captured_target(&event) {
                let _ = target.release_pointer_capture(event.pointer_id());
            }
            dispatcher.dispatch(AppAction::Drag(DragInput::End {
                pointer_id: event.pointer_id(),
                over: drop_target_at(event.client_x(), event.client_y()),
            }));
        })
    };

    let pointer_cancel = {
        let dispatcher = dispatcher.clone();
        Callback::from(move |event: web_sys::PointerEvent| {
            if let Some(target) = captured_target(&event) {
                let _ = target.release_pointer_capture(event.pointer_id());
            }
            dispatcher.dispatch(AppAction::Drag(DragInput::Cancel {
                pointer_id: event.pointer_id(),
            }));
        })
    };

    html! {
        <div key={episode.id.to_string()}
            class={classes!("episode-card", dragging.then_some("dragging"))}
            style={card_style(episode)}
            title={episode.tooltip()}
            onpointerdown={pointer_down}
            onpointermove={pointer_move}
            onpointerup={pointer_up}
            onpointercancel={pointer_cancel}>
            { render_caption(episode) }
        </div>
    }
}

fn card_style(episode: &Episode) -> String {
    format!(
        "background-image: url({}); touch-action: none;",
        episode.image_url
    )
}

fn render_caption(episode: &Episode) -> Html {
    html! {
        <div class="episode-caption">
            <p>{ format!("E{}: {}", episode.episode_number, episode.name) }</p>
        </div>
    }
}

fn render_drag_overlay(state: &AppState) -> Html {
    let Some(item) = state.drag.item() else {
        return html! {};
    };
    let (x, y) = item.position;
    let style = format!(
        "{} position: fixed; left: {:.1}px; top: {:.1}px; pointer-events: none; \
         transform: translate(-50%, -50%) rotate(3deg); z-index: 50;",
        card_style(&item.episode),
        x,
        y
    );

    html! {
        <div class="episode-card drag-overlay" style={style}>
            { render_caption(&item.episode) }
        </div>
    }
}

#[wasm_bindgen(start)]
pub fn run_app() {
    yew::Renderer::<App>::new().render();
}
