use csicore::display::{AxisBounds, SeriesPoint};
use csicore::prelude::PredictionSample;
use iced::{
    mouse, time,
    widget::{
        canvas::{self, Canvas, Frame, Geometry, Path, Stroke},
        column, row, scrollable, text, Column, Container,
    },
    Alignment, Color, Element, Length, Point, Rectangle, Renderer, Size, Subscription, Task,
    Theme,
};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BRIDGE_URL: &str = "http://127.0.0.1:9000/payload";
/// Fixed amplitude ceiling of the bar chart; raised only when a bar exceeds it.
const AMPLITUDE_CEILING: f32 = 40.0;
const TRAIL_LENGTH: usize = 50;

fn main() -> iced::Result {
    env_logger::init();
    log::info!("[visualizer] polling {}", bridge_url());
    iced::application(Visualizer::boot, Visualizer::update, Visualizer::view)
        .title(application_title)
        .subscription(application_subscription)
        .theme(application_theme)
        .run()
}

fn application_title(_: &Visualizer) -> String {
    "CSI Station Visualizer".into()
}

fn application_subscription(_: &Visualizer) -> Subscription<Message> {
    time::every(Duration::from_millis(200)).map(|_| Message::Tick)
}

fn application_theme(_: &Visualizer) -> Theme {
    Theme::Dark
}

fn bridge_url() -> String {
    std::env::var("CSI_BRIDGE_URL").unwrap_or_else(|_| DEFAULT_BRIDGE_URL.into())
}

#[derive(Debug)]
struct Visualizer {
    payload: Option<StationPayload>,
    trail: Vec<PredictionSample>,
    status: String,
    history: Vec<String>,
    last_accepted: usize,
}

#[derive(Debug, Clone)]
enum Message {
    Tick,
    PayloadFetched(Result<StationPayload, String>),
}

impl Visualizer {
    fn boot() -> (Self, Task<Message>) {
        (
            Visualizer {
                payload: None,
                trail: Vec::new(),
                status: "Waiting for telemetry...".into(),
                history: Vec::new(),
                last_accepted: 0,
            },
            Task::perform(fetch_payload(bridge_url()), Message::PayloadFetched),
        )
    }

    fn update(state: &mut Self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => Task::perform(fetch_payload(bridge_url()), Message::PayloadFetched),
            Message::PayloadFetched(Ok(payload)) => {
                if let Some(position) = payload.position {
                    if state.trail.last() != Some(&position) {
                        state.trail.push(position);
                        if state.trail.len() > TRAIL_LENGTH {
                            state.trail.remove(0);
                        }
                    }
                }
                if payload.accepted < state.last_accepted {
                    state.push_history("Station restarted".into());
                    state.trail.clear();
                }
                if !payload.status.is_empty()
                    && state.payload.as_ref().map(|p| p.status.as_str()) != Some(&payload.status)
                {
                    state.push_history(payload.status.clone());
                }
                state.last_accepted = payload.accepted;
                state.status = format!(
                    "Telemetry received: {} records, {} distance points",
                    payload.accepted,
                    payload.distance.len()
                );
                state.payload = Some(payload);
                Task::none()
            }
            Message::PayloadFetched(Err(err)) => {
                log::debug!("[visualizer] bridge request failed: {err}");
                state.status = format!("Bridge error: {err}");
                Task::none()
            }
        }
    }

    fn view(state: &Self) -> Element<'_, Message> {
        let payload = state.payload.clone().unwrap_or_default();

        let amplitude_caption = if payload.amplitudes.is_empty() {
            text("CSI amplitude: no frames yet").size(18)
        } else {
            text(format!(
                "CSI amplitude ({} subcarriers, {}/{} frames averaged)",
                payload.amplitudes.len(),
                payload.frames_in_window,
                payload.smoothing_window
            ))
            .size(18)
        };

        let bars = Canvas::new(AmplitudeBars {
            values: payload.amplitudes.clone(),
        })
        .width(Length::Fill)
        .height(Length::Fixed(260.0));

        let bounds = payload.distance_bounds;
        let distance_caption = match payload.distance.last() {
            Some(point) => text(format!(
                "Distance {:.2} m at {:.1} s (axis {:.1}..{:.1} s, {:.1}..{:.1} m)",
                point.value, point.t, bounds.x_min, bounds.x_max, bounds.y_min, bounds.y_max
            ))
            .size(16),
            None => text("Distance: n/a").size(16),
        };

        let distance_chart = Canvas::new(DistanceChart {
            points: payload.distance.clone(),
            bounds,
        })
        .width(Length::Fill)
        .height(Length::Fixed(200.0));

        let position_caption = match payload.position {
            Some(position) => {
                text(format!("Predicted location -> X: {:.2}, Y: {:.2}", position.x, position.y))
                    .size(18)
            }
            None => text("Predicted location: n/a").size(18),
        };

        let position_map = Canvas::new(PositionMap {
            trail: state.trail.clone(),
        })
        .width(Length::Fixed(320.0))
        .height(Length::Fixed(320.0));

        let history_list = if state.history.is_empty() {
            Column::new().push(text("No activity yet").size(12))
        } else {
            state
                .history
                .iter()
                .rev()
                .fold(Column::new().spacing(4), |col, entry| {
                    col.push(text(entry.clone()).size(12))
                })
        };

        let telemetry_column = column![
            text("Telemetry").size(26),
            text(&state.status).size(14),
            amplitude_caption,
            bars,
            distance_caption,
            distance_chart,
        ]
        .spacing(10)
        .padding(16)
        .width(Length::Fill);

        let position_column = column![
            text("Position").size(26),
            position_caption,
            position_map,
            text("Activity log").size(16),
            Container::new(scrollable(history_list).height(Length::Fixed(120.0))).padding(6),
        ]
        .spacing(10)
        .padding(16)
        .width(Length::Fixed(360.0));

        let layout = row![telemetry_column, position_column]
            .spacing(20)
            .align_y(Alignment::Start)
            .padding(20);

        Container::new(layout)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_y(Length::Fill)
            .into()
    }

    fn push_history(&mut self, entry: String) {
        self.history.push(entry);
        if self.history.len() > 20 {
            self.history.remove(0);
        }
    }
}

async fn fetch_payload(url: String) -> Result<StationPayload, String> {
    let response = reqwest::get(url).await.map_err(|e| e.to_string())?;
    response
        .json::<StationPayload>()
        .await
        .map_err(|e| e.to_string())
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StationPayload {
    #[serde(default)]
    amplitudes: Vec<f32>,
    #[serde(default)]
    smoothing_window: usize,
    #[serde(default)]
    frames_in_window: usize,
    #[serde(default)]
    distance: Vec<SeriesPoint>,
    #[serde(default)]
    distance_bounds: AxisBounds,
    #[serde(default)]
    position: Option<PredictionSample>,
    #[serde(default)]
    accepted: usize,
    #[serde(default)]
    status: String,
}

fn background(frame: &mut Frame, size: Size) {
    frame.fill_rectangle(Point::ORIGIN, size, Color::from_rgb(0.05, 0.05, 0.05));
}

#[derive(Clone)]
struct AmplitudeBars {
    values: Vec<f32>,
}

impl canvas::Program<Message> for AmplitudeBars {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        background(&mut frame, bounds.size());

        if !self.values.is_empty() {
            let ceiling = self
                .values
                .iter()
                .cloned()
                .fold(AMPLITUDE_CEILING, f32::max);
            let slot = bounds.width / self.values.len() as f32;
            let bar_width = (slot * 0.8).max(1.0);
            for (idx, value) in self.values.iter().enumerate() {
                let height = (value / ceiling).clamp(0.0, 1.0) * bounds.height;
                frame.fill_rectangle(
                    Point::new(idx as f32 * slot, bounds.height - height),
                    Size::new(bar_width, height),
                    Color::from_rgb(0.18, 0.72, 0.89),
                );
            }
        }

        vec![frame.into_geometry()]
    }
}

#[derive(Clone)]
struct DistanceChart {
    points: Vec<SeriesPoint>,
    bounds: AxisBounds,
}

impl canvas::Program<Message> for DistanceChart {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        background(&mut frame, bounds.size());

        let x_span = (self.bounds.x_max - self.bounds.x_min).max(f32::EPSILON);
        let y_span = (self.bounds.y_max - self.bounds.y_min).max(f32::EPSILON);
        let project = |point: &SeriesPoint| {
            Point::new(
                (point.t - self.bounds.x_min) / x_span * bounds.width,
                bounds.height - (point.value - self.bounds.y_min) / y_span * bounds.height,
            )
        };

        let visible: Vec<Point> = self
            .points
            .iter()
            .filter(|point| point.t >= self.bounds.x_min)
            .map(project)
            .collect();

        if visible.len() > 1 {
            let path = Path::new(|builder| {
                for (i, point) in visible.iter().enumerate() {
                    if i == 0 {
                        builder.move_to(*point);
                    } else {
                        builder.line_to(*point);
                    }
                }
            });
            frame.stroke(
                &path,
                Stroke::default()
                    .with_width(2.0)
                    .with_color(Color::from_rgb(0.9, 0.25, 0.25)),
            );
        }
        for point in &visible {
            let marker = Path::new(|builder| builder.circle(*point, 3.0));
            frame.fill(&marker, Color::from_rgb(0.9, 0.25, 0.25));
        }

        vec![frame.into_geometry()]
    }
}

#[derive(Clone)]
struct PositionMap {
    trail: Vec<PredictionSample>,
}

impl canvas::Program<Message> for PositionMap {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        frame.fill_rectangle(
            Point::ORIGIN,
            bounds.size(),
            Color::from_rgb(0.02, 0.02, 0.04),
        );

        // Square extent around the origin that fits every trail point.
        let extent = self
            .trail
            .iter()
            .map(|p| p.x.abs().max(p.y.abs()))
            .fold(1.0, f32::max)
            * 1.1;
        let center = Point::new(bounds.width / 2.0, bounds.height / 2.0);
        let radius = bounds.width.min(bounds.height) / 2.0 - 12.0;
        let to_screen = |p: &PredictionSample| {
            Point::new(
                center.x + p.x / extent * radius,
                center.y - p.y / extent * radius,
            )
        };

        let axes = Path::new(|builder| {
            builder.move_to(Point::new(center.x - radius, center.y));
            builder.line_to(Point::new(center.x + radius, center.y));
            builder.move_to(Point::new(center.x, center.y - radius));
            builder.line_to(Point::new(center.x, center.y + radius));
        });
        frame.stroke(
            &axes,
            Stroke::default()
                .with_color(Color::from_rgb(0.35, 0.35, 0.45))
                .with_width(1.0),
        );

        let count = self.trail.len();
        for (idx, sample) in self.trail.iter().enumerate() {
            let newest = idx + 1 == count;
            let fade = (idx + 1) as f32 / count.max(1) as f32;
            let marker = Path::new(|builder| {
                builder.circle(to_screen(sample), if newest { 7.0 } else { 3.0 })
            });
            frame.fill(&marker, Color::from_rgba(0.95, 0.55, 0.2, fade));
        }

        vec![frame.into_geometry()]
    }
}
