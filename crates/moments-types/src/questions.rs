/// The fixed question bank used for automatic days and the "surprise me" option.
pub const DAILY_QUESTIONS: [&str; 20] = [
    "Wat is een klein, onverwacht moment dat je onlangs een diep gevoel van vrede of rust gaf?",
    "Welke geur roept onmiddellijk een sterke, aangename herinnering op? Vertel me over die herinnering.",
    "Als je morgen wakker zou kunnen worden met een nieuwe vaardigheid of talent, wat zou het zijn en waarom?",
    "Beschrijf een droom (een nachtdroom of een dagdroom) die je onlangs hebt gehad en die je is bijgebleven.",
    "Wat is iets kleins dat je vandaag oprecht heeft doen glimlachen?",
    "Welk advies zou je je jongere zelf geven als je 5 minuten terug in de tijd kon gaan?",
    "Als je een mythisch wezen als huisdier zou kunnen hebben, wat zou het zijn en hoe zou je het noemen?",
    "Wat is een liedje waar je altijd vrolijk van wordt? Wat vind je er zo geweldig aan?",
    "Beschrijf een plek waar je nog nooit bent geweest, maar waar je een vreemde band mee voelt.",
    "Wat is een simpel genot waar je nooit genoeg van krijgt?",
    "Als je een dag met een historisch figuur zou kunnen doorbrengen, wie zou het zijn en waar zouden jullie het over hebben?",
    "Wat is een eigenschap die je in anderen bewondert en die je graag in jezelf zou willen ontwikkelen?",
    "Deel een herinnering aan een moment waarop je je volledig in je element voelde.",
    "Welk boek, welke film of welk kunstwerk heeft je onlangs diep geraakt?",
    "Als je een nieuwe feestdag zou kunnen creëren, wat zou die vieren en wat zouden de tradities zijn?",
    "Wat is iets, groot of klein, waar je op dit moment naar uitkijkt?",
    "Beschrijf jouw idee van een perfecte, gezellige avond.",
    "Wat is een kleine daad van vriendelijkheid die je hebt gezien of ervaren die je hart heeft verwarmd?",
    "Als je gevoelens een landschap waren, hoe zou het er dan op dit moment uitzien?",
    "Wat is een doel waar je naartoe werkt waar je trots op bent?",
];

pub fn is_bank_question(question: &str) -> bool {
    DAILY_QUESTIONS.contains(&question)
}
