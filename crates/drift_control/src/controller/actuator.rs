//! Convergence Actuator - Führt die Korrektur für eine Abweichung aus
//!
//! Der Aktuator patcht nie: er ersetzt die Instanz immer komplett
//! (stoppen, entfernen, neu provisionieren). Damit gibt es für alle
//! Abweichungskategorien einen einzigen deterministischen Korrekturpfad.

use drift_config::DesiredState;

use crate::state::ObservedState;
use crate::{ContainerRuntime, ControlUI, DriftControlError};

/// Fehlermeldungen mit denen die Runtime einen belegten Host-Port meldet.
///
/// Die Runtime liefert keinen strukturierten Konflikt-Fehler, deshalb ist
/// das eine heuristische Text-Klassifikation. Die Signaturen sind hier
/// isoliert damit sie ohne Änderung der Aktuator-Logik austauschbar sind.
pub const PORT_CONFLICT_SIGNATURES: [&str; 5] = [
    "address already in use",
    "port is already allocated",
    "bind for",
    "failed to bind host port",
    "programming external connectivity",
];

/// Prüft ob ein Runtime-Fehler ein Port-Konflikt ist.
pub fn is_port_conflict(err: &DriftControlError) -> bool {
    let message = match err {
        DriftControlError::CommandFailed(msg) => msg.to_lowercase(),
        _ => return false,
    };
    PORT_CONFLICT_SIGNATURES.iter().any(|sig| message.contains(sig))
}

/// Führt die Konvergenz für den Setpoint aus.
///
/// Ablauf:
/// 1. Existierende Instanz stoppen und entfernen
/// 2. Image ziehen (Pull-Fehler außer "nicht gefunden" nur warnen und den
///    lokalen Cache verwenden)
/// 3. Neue Instanz auf dem primären Port starten
/// 4. Bei einem Port-Konflikt genau ein Versuch auf dem Fallback-Port,
///    sofern konfiguriert - nie mehr als zwei Kandidaten
///
/// Bei Erfolg existiert genau eine Instanz, gebunden auf Primär- oder
/// Fallback-Port. Bei jedem propagierten Fehler ist die Instanz höchstens
/// abwesend, nie halb konfiguriert.
pub async fn converge<R, U>(
    runtime: &R,
    desired: &DesiredState,
    observed: &ObservedState,
    ui: &mut U,
) -> Result<(), DriftControlError>
where
    R: ContainerRuntime + ?Sized,
    U: ControlUI,
{
    if observed.is_present() {
        ui.on_teardown(&desired.app_name);
        runtime.stop(&desired.app_name).await?;
        runtime.remove(&desired.app_name, false).await?;
    }

    // Begrenzte Kandidatenliste statt Rekursion: die Tiefe-2-Grenze ist
    // strukturell sichtbar
    let mut candidates = vec![desired.host_port];
    if let Some(fallback) = desired.fallback_host_port {
        candidates.push(fallback);
    }

    let last_attempt = candidates.len() - 1;
    for (attempt, &port) in candidates.iter().enumerate() {
        match runtime.pull(&desired.image).await {
            Ok(()) => {}
            Err(err @ DriftControlError::ImageNotFound(_)) => return Err(err),
            Err(_) => ui.on_pull_warning(&desired.image),
        }

        ui.on_provisioning(port);
        let result = runtime
            .run_detached(&desired.image, &desired.app_name, desired.container_port, port)
            .await;

        match result {
            Ok(()) => {
                ui.on_healed(port);
                return Ok(());
            }
            Err(err) if attempt < last_attempt && is_port_conflict(&err) => {
                ui.on_port_busy(port, candidates[attempt + 1]);
                // Teilweise angelegte Instanz wegräumen bevor der
                // Fallback-Versuch startet
                runtime.remove(&desired.app_name, true).await?;
            }
            Err(err) => return Err(err),
        }
    }

    // Jeder letzte Versuch kehrt oben zurück
    Err(DriftControlError::CommandFailed(
        "no usable host port candidate".to_string(),
    ))
}
