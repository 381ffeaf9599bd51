/*!
# Statboard DevKit - Helpers côté agent pour les tests

Reproduit le format de fil de l'agent de collecte sans lancer d'agent:
- Construction du payload `{key, cpu, ram}`
- Mesures en nombres ou en chaînes à décimales fixes (comme l'agent)
- Échappement en `json=<...>` prêt à coller sur une URL
*/

pub mod report_builder;

pub use report_builder::ReportBuilder;
